//! Repository layer — entity-scoped database operations.
//!
//! Free functions over `&Connection`, grouped per entity.
//! All public functions are re-exported here.

mod conversation;
mod document;
mod profile;
mod settings;
mod usage;

pub use conversation::*;
pub use document::*;
pub use profile::*;
pub use settings::*;
pub use usage::*;
