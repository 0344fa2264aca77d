use serde::{Deserialize, Serialize};

use super::enums::Theme;

/// Single-row user profile (id = 1 in the database).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub theme: Theme,
}
