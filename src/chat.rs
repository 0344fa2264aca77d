//! Chat surface — conversation lifecycle, titles, summaries, projections.
//!
//! Builds on top of:
//! - `models::Conversation` / `models::Message` (data structs)
//! - `db::repository` (low-level insert/query)
//!
//! This module adds:
//! - the welcome message every fresh conversation starts with
//! - title derivation from the first user message
//! - conversation summaries for the sidebar
//! - deletion with active-conversation promotion
//! - the message view projection that turns stored marker text into
//!   numbered citations

use chrono::{Local, NaiveDateTime, Timelike};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::{
    active_conversation_id, delete_conversation, get_conversation, insert_conversation,
    insert_message, list_conversations, set_active_conversation, update_conversation_title,
};
use crate::db::DatabaseError;
use crate::models::enums::MessageRole;
use crate::models::{Conversation, Message};
use crate::rag::citation::{extract_citations, Citation};

/// Title given to conversations before the first user message names them.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// Opening model message seeded into every fresh conversation.
pub const WELCOME_MESSAGE: &str =
    "Hello! I'm your RAG assistant. Upload documents to the Knowledge Base or ask me anything.";

/// Title truncation length, in characters.
const TITLE_MAX_CHARS: usize = 30;

// ═══════════════════════════════════════════
// Frontend-facing types
// ═══════════════════════════════════════════

/// Conversation summary for the sidebar list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub last_message_at: NaiveDateTime,
    pub message_count: u32,
    pub last_message_preview: String,
}

/// A message as rendered: marker text replaced by `[n]` reference tokens,
/// citations re-derived from the stored text on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub role: MessageRole,
    pub text: String,
    pub citations: Vec<Citation>,
    pub created_at: NaiveDateTime,
}

/// Result of deleting a conversation, including which conversation is
/// active afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted: bool,
    pub active_conversation_id: Option<Uuid>,
}

// ═══════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════

/// Now, at whole-second resolution. Timestamps are stored as
/// `%Y-%m-%d %H:%M:%S` text, so sub-second precision would not survive the
/// round-trip.
pub fn current_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Derive a conversation title from the first user message: the first 30
/// characters, with an ellipsis when truncated.
pub fn derive_title(first_message: &str) -> String {
    let mut title: String = first_message.chars().take(TITLE_MAX_CHARS).collect();
    if title.len() < first_message.len() {
        title.push_str("...");
    }
    title
}

/// Give a still-default-titled conversation a title from `user_text`.
/// Explicitly renamed conversations are never touched.
pub fn ensure_titled(
    conn: &Connection,
    conversation: &Conversation,
    user_text: &str,
) -> Result<(), DatabaseError> {
    if conversation.title == DEFAULT_CONVERSATION_TITLE {
        update_conversation_title(conn, &conversation.id, &derive_title(user_text))?;
    }
    Ok(())
}

// ═══════════════════════════════════════════
// Conversation lifecycle
// ═══════════════════════════════════════════

/// Create a fresh conversation seeded with the welcome message.
pub fn create_conversation_with_welcome(conn: &Connection) -> Result<Conversation, DatabaseError> {
    let now = current_timestamp();
    let conversation = Conversation {
        id: Uuid::new_v4(),
        title: DEFAULT_CONVERSATION_TITLE.to_string(),
        created_at: now,
        updated_at: now,
    };
    insert_conversation(conn, &conversation)?;

    let welcome = Message {
        id: Uuid::new_v4(),
        conversation_id: conversation.id,
        role: MessageRole::Model,
        content: WELCOME_MESSAGE.to_string(),
        created_at: now,
    };
    insert_message(conn, &welcome)?;

    Ok(conversation)
}

/// Return a valid active conversation id, repairing state as needed.
///
/// If the recorded active conversation is missing (never set, or just
/// deleted), the newest remaining conversation is promoted; with none
/// left, a fresh welcome conversation is created. The conversation set is
/// therefore never empty past this call.
pub fn ensure_active_conversation(conn: &Connection) -> Result<Uuid, DatabaseError> {
    if let Some(active_id) = active_conversation_id(conn)? {
        if get_conversation(conn, &active_id)?.is_some() {
            return Ok(active_id);
        }
    }

    let promoted = match list_conversations(conn)?.first() {
        Some(first) => first.id,
        None => {
            let fresh = create_conversation_with_welcome(conn)?;
            tracing::info!(conversation_id = %fresh.id, "Started fresh conversation");
            fresh.id
        }
    };
    set_active_conversation(conn, &promoted)?;
    Ok(promoted)
}

/// Delete a conversation and report which conversation is active now.
///
/// Deleting the active conversation promotes the newest remaining one;
/// deleting the sole conversation creates a fresh welcome conversation
/// with a new id.
pub fn delete_conversation_and_promote(
    conn: &Connection,
    conversation_id: &Uuid,
) -> Result<DeleteOutcome, DatabaseError> {
    let deleted = delete_conversation(conn, conversation_id)?;
    if !deleted {
        return Ok(DeleteOutcome {
            deleted: false,
            active_conversation_id: active_conversation_id(conn)?,
        });
    }

    let active = ensure_active_conversation(conn)?;
    tracing::info!(
        deleted_id = %conversation_id,
        active_conversation_id = %active,
        "Conversation deleted"
    );
    Ok(DeleteOutcome {
        deleted: true,
        active_conversation_id: Some(active),
    })
}

// ═══════════════════════════════════════════
// Derived queries
// ═══════════════════════════════════════════

/// List all conversations with derived summary fields, newest first.
pub fn list_conversation_summaries(
    conn: &Connection,
) -> Result<Vec<ConversationSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT
            c.id,
            c.title,
            COALESCE(MAX(m.created_at), c.updated_at) AS last_message_at,
            COUNT(m.id) AS message_count,
            COALESCE(
                (SELECT SUBSTR(m2.content, 1, 80) FROM messages m2
                 WHERE m2.conversation_id = c.id
                 ORDER BY m2.created_at DESC, m2.rowid DESC LIMIT 1),
                ''
            ) AS last_message_preview
         FROM conversations c
         LEFT JOIN messages m ON m.conversation_id = c.id
         GROUP BY c.id
         ORDER BY c.created_at DESC, c.rowid DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (id, title, last_message_at, message_count, last_message_preview) = row?;
        summaries.push(ConversationSummary {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            title,
            last_message_at: NaiveDateTime::parse_from_str(&last_message_at, "%Y-%m-%d %H:%M:%S")
                .unwrap_or_default(),
            message_count: message_count as u32,
            last_message_preview,
        });
    }
    Ok(summaries)
}

/// Project stored messages into their rendered form. Model messages get
/// their markers rewritten and citations attached; user messages pass
/// through untouched.
pub fn message_views(messages: Vec<Message>) -> Vec<MessageView> {
    messages
        .into_iter()
        .map(|m| match m.role {
            MessageRole::Model => {
                let processed = extract_citations(&m.content);
                MessageView {
                    id: m.id,
                    role: m.role,
                    text: processed.text,
                    citations: processed.citations,
                    created_at: m.created_at,
                }
            }
            MessageRole::User => MessageView {
                id: m.id,
                role: m.role,
                text: m.content,
                citations: vec![],
                created_at: m.created_at,
            },
        })
        .collect()
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::get_messages;
    use crate::db::sqlite::open_memory_database;

    // ── Title derivation ──

    #[test]
    fn derive_title_short_message_is_whole() {
        assert_eq!(derive_title("What is in the report?"), "What is in the report?");
    }

    #[test]
    fn derive_title_exactly_thirty_chars_has_no_ellipsis() {
        let msg = "A".repeat(30);
        assert_eq!(derive_title(&msg), msg);
    }

    #[test]
    fn derive_title_long_message_truncates_with_ellipsis() {
        let msg = "A".repeat(45);
        let title = derive_title(&msg);
        assert_eq!(title, format!("{}...", "A".repeat(30)));
    }

    #[test]
    fn derive_title_counts_characters_not_bytes() {
        let msg = "自".repeat(35);
        let title = derive_title(&msg);
        assert_eq!(title, format!("{}...", "自".repeat(30)));
    }

    // ── Conversation lifecycle ──

    #[test]
    fn fresh_conversation_starts_with_welcome_message() {
        let conn = open_memory_database().unwrap();
        let conversation = create_conversation_with_welcome(&conn).unwrap();

        assert_eq!(conversation.title, DEFAULT_CONVERSATION_TITLE);
        let messages = get_messages(&conn, &conversation.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::Model);
        assert_eq!(messages[0].content, WELCOME_MESSAGE);
    }

    #[test]
    fn ensure_titled_only_replaces_the_default_title() {
        let conn = open_memory_database().unwrap();
        let conversation = create_conversation_with_welcome(&conn).unwrap();

        ensure_titled(&conn, &conversation, "Compare the two quarterly reports").unwrap();
        let named = get_conversation(&conn, &conversation.id).unwrap().unwrap();
        assert_eq!(named.title, "Compare the two quarterly repo...");

        // A later user message must not rename it again
        ensure_titled(&conn, &named, "Different text").unwrap();
        let unchanged = get_conversation(&conn, &conversation.id).unwrap().unwrap();
        assert_eq!(unchanged.title, "Compare the two quarterly repo...");
    }

    #[test]
    fn ensure_active_bootstraps_an_empty_database() {
        let conn = open_memory_database().unwrap();
        let active = ensure_active_conversation(&conn).unwrap();

        assert_eq!(active_conversation_id(&conn).unwrap(), Some(active));
        let messages = get_messages(&conn, &active).unwrap();
        assert_eq!(messages[0].content, WELCOME_MESSAGE);
    }

    #[test]
    fn ensure_active_promotes_newest_when_setting_is_stale() {
        let conn = open_memory_database().unwrap();
        let older = create_conversation_with_welcome(&conn).unwrap();
        let newer = create_conversation_with_welcome(&conn).unwrap();
        set_active_conversation(&conn, &Uuid::new_v4()).unwrap();

        let active = ensure_active_conversation(&conn).unwrap();
        // created_at ties are broken by rowid, so the later insert wins
        assert_eq!(active, newer.id);
        assert_ne!(active, older.id);
    }

    // ── Deletion and promotion ──

    #[test]
    fn deleting_inactive_conversation_keeps_active_unchanged() {
        let conn = open_memory_database().unwrap();
        let keep = create_conversation_with_welcome(&conn).unwrap();
        let doomed = create_conversation_with_welcome(&conn).unwrap();
        set_active_conversation(&conn, &keep.id).unwrap();

        let outcome = delete_conversation_and_promote(&conn, &doomed.id).unwrap();
        assert!(outcome.deleted);
        assert_eq!(outcome.active_conversation_id, Some(keep.id));
    }

    #[test]
    fn deleting_active_conversation_promotes_a_remaining_one() {
        let conn = open_memory_database().unwrap();
        let survivor = create_conversation_with_welcome(&conn).unwrap();
        let active = create_conversation_with_welcome(&conn).unwrap();
        set_active_conversation(&conn, &active.id).unwrap();

        let outcome = delete_conversation_and_promote(&conn, &active.id).unwrap();
        assert!(outcome.deleted);
        assert_eq!(outcome.active_conversation_id, Some(survivor.id));
    }

    #[test]
    fn deleting_sole_conversation_starts_a_fresh_one() {
        let conn = open_memory_database().unwrap();
        let only = create_conversation_with_welcome(&conn).unwrap();
        set_active_conversation(&conn, &only.id).unwrap();

        let outcome = delete_conversation_and_promote(&conn, &only.id).unwrap();
        assert!(outcome.deleted);

        let fresh_id = outcome.active_conversation_id.unwrap();
        assert_ne!(fresh_id, only.id);

        let conversations = list_conversations(&conn).unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].id, fresh_id);

        let messages = get_messages(&conn, &fresh_id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, WELCOME_MESSAGE);
    }

    #[test]
    fn deleting_missing_conversation_reports_not_deleted() {
        let conn = open_memory_database().unwrap();
        let existing = create_conversation_with_welcome(&conn).unwrap();
        set_active_conversation(&conn, &existing.id).unwrap();

        let outcome = delete_conversation_and_promote(&conn, &Uuid::new_v4()).unwrap();
        assert!(!outcome.deleted);
        assert_eq!(outcome.active_conversation_id, Some(existing.id));
    }

    // ── Summaries ──

    #[test]
    fn summaries_carry_counts_and_previews() {
        let conn = open_memory_database().unwrap();
        let conversation = create_conversation_with_welcome(&conn).unwrap();
        insert_message(
            &conn,
            &Message {
                id: Uuid::new_v4(),
                conversation_id: conversation.id,
                role: MessageRole::User,
                content: "What does the report conclude?".to_string(),
                created_at: current_timestamp(),
            },
        )
        .unwrap();

        let summaries = list_conversation_summaries(&conn).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, conversation.id);
        assert_eq!(summaries[0].message_count, 2);
        assert_eq!(summaries[0].last_message_preview, "What does the report conclude?");
    }

    #[test]
    fn summaries_list_newest_conversation_first() {
        let conn = open_memory_database().unwrap();
        let _older = create_conversation_with_welcome(&conn).unwrap();
        let newer = create_conversation_with_welcome(&conn).unwrap();

        let summaries = list_conversation_summaries(&conn).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, newer.id);
    }

    // ── Message views ──

    #[test]
    fn model_messages_are_projected_with_citations() {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            role: MessageRole::Model,
            content: "It grew 12% [Source: report.pdf, Page: 3].".to_string(),
            created_at: current_timestamp(),
        };

        let views = message_views(vec![message]);
        assert_eq!(views[0].text, "It grew 12% [1].");
        assert_eq!(views[0].citations.len(), 1);
        assert_eq!(views[0].citations[0].document_name_hint, "report.pdf");
    }

    #[test]
    fn user_messages_pass_through_untouched() {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            role: MessageRole::User,
            content: "Anything about [Source: report.pdf]?".to_string(),
            created_at: current_timestamp(),
        };

        let views = message_views(vec![message]);
        assert_eq!(views[0].text, "Anything about [Source: report.pdf]?");
        assert!(views[0].citations.is_empty());
    }
}
