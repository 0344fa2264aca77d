pub mod enums;

mod conversation;
mod document;
mod profile;
mod usage;

pub use conversation::{Conversation, Message};
pub use document::Document;
pub use profile::UserProfile;
pub use usage::UsageStats;
