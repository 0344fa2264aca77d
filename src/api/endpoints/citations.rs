//! Citation resolution endpoint.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::documents::DocumentSummary;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::list_documents;
use crate::rag::resolve::resolve_citation;

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub document_name_hint: String,
    pub page_number_hint: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub resolved: bool,
    pub document: Option<DocumentSummary>,
    pub page_number: Option<u32>,
}

/// `POST /api/citations/resolve` — map a citation's document name hint
/// onto a stored document.
///
/// A miss is a 200 with `resolved: false`; clicking a stale citation
/// must never surface an error. The page hint is echoed back untouched
/// so the viewer can scroll to it.
pub async fn resolve(
    State(ctx): State<ApiContext>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let documents = list_documents(&conn, None)?;

    match resolve_citation(&documents, &payload.document_name_hint) {
        Some(doc) => Ok(Json(ResolveResponse {
            resolved: true,
            document: Some(doc.into()),
            page_number: payload.page_number_hint,
        })),
        None => Ok(Json(ResolveResponse {
            resolved: false,
            document: None,
            page_number: None,
        })),
    }
}
