use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DocumentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub content: String,
    pub size_bytes: i64,
    pub status: DocumentStatus,
    pub uploaded_at: NaiveDateTime,
}
