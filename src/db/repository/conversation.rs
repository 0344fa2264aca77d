use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::MessageRole;
use crate::models::{Conversation, Message};

pub fn insert_conversation(conn: &Connection, conv: &Conversation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            conv.id.to_string(),
            conv.title,
            conv.created_at.to_string(),
            conv.updated_at.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_conversation(conn: &Connection, id: &Uuid) -> Result<Option<Conversation>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(ConversationRow {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(conversation_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List all conversations, most recently created first.
pub fn list_conversations(conn: &Connection) -> Result<Vec<Conversation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, created_at, updated_at FROM conversations
         ORDER BY created_at DESC, rowid DESC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(ConversationRow {
            id: row.get(0)?,
            title: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    })?;

    let mut conversations = Vec::new();
    for row in rows {
        conversations.push(conversation_from_row(row?)?);
    }
    Ok(conversations)
}

/// Update the title of a conversation.
pub fn update_conversation_title(
    conn: &Connection,
    conversation_id: &Uuid,
    title: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE conversations SET title = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![title, conversation_id.to_string()],
    )?;
    Ok(())
}

/// Bump a conversation's updated_at to now.
pub fn touch_conversation(conn: &Connection, conversation_id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE conversations SET updated_at = datetime('now') WHERE id = ?1",
        params![conversation_id.to_string()],
    )?;
    Ok(())
}

/// Delete a conversation and all its messages (CASCADE).
pub fn delete_conversation(conn: &Connection, conversation_id: &Uuid) -> Result<bool, DatabaseError> {
    let rows_affected = conn.execute(
        "DELETE FROM conversations WHERE id = ?1",
        params![conversation_id.to_string()],
    )?;
    Ok(rows_affected > 0)
}

pub fn insert_message(conn: &Connection, msg: &Message) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            msg.id.to_string(),
            msg.conversation_id.to_string(),
            msg.role.as_str(),
            msg.content,
            msg.created_at.to_string(),
        ],
    )?;
    Ok(())
}

/// Messages of a conversation in insertion order.
///
/// rowid breaks ties within the same second — a user message and its
/// streaming placeholder are usually created in the same second.
pub fn get_messages(conn: &Connection, conversation_id: &Uuid) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, role, content, created_at
         FROM messages WHERE conversation_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![conversation_id.to_string()], |row| {
        Ok(MessageRow {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row?)?);
    }
    Ok(messages)
}

/// Replace a message's text with a new cumulative snapshot.
/// Streaming updates overwrite, never append.
pub fn overwrite_message_text(
    conn: &Connection,
    message_id: &Uuid,
    text: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE messages SET content = ?1 WHERE id = ?2",
        params![text, message_id.to_string()],
    )?;
    Ok(())
}

struct ConversationRow {
    id: String,
    title: String,
    created_at: String,
    updated_at: String,
}

struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    created_at: String,
}

fn conversation_from_row(row: ConversationRow) -> Result<Conversation, DatabaseError> {
    Ok(Conversation {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        title: row.title,
        created_at: NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_default(),
        updated_at: NaiveDateTime::parse_from_str(&row.updated_at, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_default(),
    })
}

fn message_from_row(row: MessageRow) -> Result<Message, DatabaseError> {
    Ok(Message {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        conversation_id: Uuid::parse_str(&row.conversation_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        role: MessageRole::from_str(&row.role)?,
        content: row.content,
        created_at: NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_default(),
    })
}
