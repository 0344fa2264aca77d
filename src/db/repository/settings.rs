use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;

const ACTIVE_CONVERSATION_KEY: &str = "active_conversation_id";

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let result = conn.query_row(
        "SELECT value FROM app_settings WHERE key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO app_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// The currently active conversation, if the stored value parses.
pub fn active_conversation_id(conn: &Connection) -> Result<Option<Uuid>, DatabaseError> {
    Ok(get_setting(conn, ACTIVE_CONVERSATION_KEY)?
        .and_then(|v| Uuid::parse_str(&v).ok()))
}

pub fn set_active_conversation(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    set_setting(conn, ACTIVE_CONVERSATION_KEY, &id.to_string())
}
