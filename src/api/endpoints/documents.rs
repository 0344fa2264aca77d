//! Knowledge-base document endpoints.
//!
//! Upload accepts multipart file fields, validates the extension
//! allowlist before any record exists, then walks each file through the
//! `processing -> ready | error` lifecycle. Reads serve summaries
//! without the content blob; the pages endpoint serves the paginated
//! text the citation viewer scrolls through.

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::chat::current_timestamp;
use crate::db::repository::{
    delete_document, document_stats, get_document, insert_document, list_documents,
    mark_document_error, mark_document_ready, DocumentStats,
};
use crate::models::enums::DocumentStatus;
use crate::models::Document;
use crate::rag::pager::{page_count, paginate, CHARS_PER_PAGE};

/// File extensions accepted by the upload endpoint. Everything is
/// stored as decoded text, so only text-bearing formats qualify.
const ALLOWED_EXTENSIONS: &[&str] = &["txt", "md", "json", "csv", "js", "ts", "tsx", "py"];

/// Document projection without the content blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub status: DocumentStatus,
    pub uploaded_at: NaiveDateTime,
    pub page_count: usize,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            name: doc.name.clone(),
            mime_type: doc.mime_type.clone(),
            size_bytes: doc.size_bytes,
            status: doc.status,
            uploaded_at: doc.uploaded_at,
            page_count: page_count(&doc.content, CHARS_PER_PAGE),
        }
    }
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub documents: Vec<DocumentSummary>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    /// Case-insensitive name substring filter.
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
}

#[derive(Serialize)]
pub struct PageView {
    /// 1-based page number.
    pub number: usize,
    pub text: String,
}

#[derive(Serialize)]
pub struct PagesResponse {
    pub document_id: Uuid,
    pub name: String,
    pub page_size: usize,
    pub pages: Vec<PageView>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// `POST /api/documents` — multipart upload of one or more files.
///
/// Every file in the batch is validated against the extension allowlist
/// before any record is created; one bad file rejects the whole batch.
/// Valid files are inserted as `processing`, then flipped to `ready`
/// with their decoded text, or to `error` when the bytes are not UTF-8.
pub async fn upload(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut files: Vec<(String, String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        if !allowed_extension(&file_name) {
            return Err(ApiError::BadRequest(format!(
                "Unsupported file type: {file_name}"
            )));
        }
        let mime_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| mime_for(&file_name).to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
        files.push((file_name, mime_type, data.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files in upload".into()));
    }

    let conn = ctx.core.open_db()?;
    let mut documents = Vec::with_capacity(files.len());
    for (name, mime_type, data) in files {
        let mut doc = Document {
            id: Uuid::new_v4(),
            name,
            mime_type,
            content: String::new(),
            size_bytes: data.len() as i64,
            status: DocumentStatus::Processing,
            uploaded_at: current_timestamp(),
        };
        insert_document(&conn, &doc)?;

        match String::from_utf8(data) {
            Ok(text) => {
                mark_document_ready(&conn, &doc.id, &text)?;
                doc.content = text;
                doc.status = DocumentStatus::Ready;
                tracing::info!(
                    document_id = %doc.id,
                    name = %doc.name,
                    pages = page_count(&doc.content, CHARS_PER_PAGE),
                    "Document ready"
                );
            }
            Err(_) => {
                mark_document_error(&conn, &doc.id)?;
                doc.status = DocumentStatus::Error;
                tracing::warn!(
                    document_id = %doc.id,
                    name = %doc.name,
                    "Document is not valid UTF-8 text"
                );
            }
        }
        documents.push(DocumentSummary::from(&doc));
    }

    Ok(Json(UploadResponse { documents }))
}

/// `GET /api/documents` — summaries in upload order, optionally
/// filtered by `?q=` name substring.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let documents = list_documents(&conn, query.q.as_deref())?
        .iter()
        .map(DocumentSummary::from)
        .collect();
    Ok(Json(DocumentListResponse { documents }))
}

/// `GET /api/documents/stats` — total and ready counts.
pub async fn stats(State(ctx): State<ApiContext>) -> Result<Json<DocumentStats>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(document_stats(&conn)?))
}

/// `GET /api/documents/:id` — full document, content included.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    let conn = ctx.core.open_db()?;
    let document = get_document(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Document not found: {id}")))?;
    Ok(Json(document))
}

/// `GET /api/documents/:id/pages` — content split into fixed-size
/// pages for the citation viewer.
pub async fn pages(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<PagesResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let document = get_document(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Document not found: {id}")))?;

    let pages = paginate(&document.content, CHARS_PER_PAGE)
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageView {
            number: i + 1,
            text,
        })
        .collect();

    Ok(Json(PagesResponse {
        document_id: document.id,
        name: document.name,
        page_size: CHARS_PER_PAGE,
        pages,
    }))
}

/// `DELETE /api/documents/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    if !delete_document(&conn, &id)? {
        return Err(ApiError::NotFound(format!("Document not found: {id}")));
    }
    tracing::info!(document_id = %id, "Document deleted");
    Ok(Json(DeleteResponse { deleted: true }))
}

/// Extension allowlist check, case-insensitive.
fn allowed_extension(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

/// Fallback MIME type when the upload field does not carry one.
fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "md" => "text/markdown",
        "json" => "application/json",
        "csv" => "text/csv",
        "js" => "text/javascript",
        "ts" | "tsx" => "text/typescript",
        "py" => "text/x-python",
        _ => "text/plain",
    }
}
