use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::enums::Theme;
use crate::models::UserProfile;

/// Load the singleton profile row. Seeded by the initial migration,
/// so a missing row is a constraint violation rather than an absence.
pub fn get_profile(conn: &Connection) -> Result<UserProfile, DatabaseError> {
    let (name, email, avatar_url, theme): (String, String, String, String) = conn.query_row(
        "SELECT name, email, avatar_url, theme FROM user_profile WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    Ok(UserProfile {
        name,
        email,
        avatar_url,
        theme: Theme::from_str(&theme)?,
    })
}

/// Partial profile update — absent fields keep their current value.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Option<Theme>,
}

pub fn update_profile(conn: &Connection, update: &ProfileUpdate) -> Result<UserProfile, DatabaseError> {
    conn.execute(
        "UPDATE user_profile SET
            name = COALESCE(?1, name),
            email = COALESCE(?2, email),
            avatar_url = COALESCE(?3, avatar_url),
            theme = COALESCE(?4, theme)
         WHERE id = 1",
        params![
            update.name,
            update.email,
            update.avatar_url,
            update.theme.map(|t| t.as_str()),
        ],
    )?;
    get_profile(conn)
}
