//! User profile endpoints.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{get_profile, update_profile, ProfileUpdate};
use crate::models::UserProfile;

/// `GET /api/profile`
pub async fn current(State(ctx): State<ApiContext>) -> Result<Json<UserProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(get_profile(&conn)?))
}

/// `PUT /api/profile` — partial update; absent fields keep their
/// current value.
pub async fn update(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("Name cannot be empty".into()));
    }
    if payload.email.as_deref().is_some_and(|e| e.trim().is_empty()) {
        return Err(ApiError::BadRequest("Email cannot be empty".into()));
    }

    let conn = ctx.core.open_db()?;
    let profile = update_profile(&conn, &payload)?;
    Ok(Json(profile))
}
