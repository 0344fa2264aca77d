pub mod citation;
pub mod context;
pub mod gemini;
pub mod orchestrator;
pub mod pager;
pub mod prompt;
pub mod resolve;
pub mod tokens;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Gemini connection failed: {0}")]
    GeminiConnection(String),

    #[error("Gemini API error {status}: {body}")]
    GeminiApi { status: u16, body: String },

    #[error("Gemini API key not configured")]
    MissingApiKey,

    #[error("Streaming error: {0}")]
    StreamingError(String),

    #[error("Monthly budget exceeded!")]
    BudgetExceeded,

    #[error("Conversation not found: {0}")]
    ConversationNotFound(Uuid),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
