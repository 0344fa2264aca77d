//! API endpoint handlers.
//!
//! Each module covers one resource. Handlers stay thin: they validate,
//! open a connection through `CoreState`, and delegate to the chat, db,
//! and rag modules.

pub mod chat;
pub mod citations;
pub mod conversations;
pub mod documents;
pub mod health;
pub mod profile;
pub mod usage;
