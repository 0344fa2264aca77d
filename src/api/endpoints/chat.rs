//! Chat endpoints — one streaming send, one cancel.
//!
//! `send` runs the whole turn on a blocking thread (SQLite and the
//! Gemini client are synchronous) and forwards orchestrator events over
//! an mpsc channel into the SSE response body.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::chat;
use crate::db::repository::{get_conversation, get_usage};
use crate::rag::orchestrator::{ChatOrchestrator, StreamEvent};

/// Maximum user message length, in characters.
const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Target conversation; the active conversation when omitted.
    pub conversation_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// `POST /api/chat/send` — run one chat turn, streaming progress as
/// server-sent events.
///
/// Pre-flight rejections (empty message, budget gate, unknown or busy
/// conversation) come back as plain JSON errors before the stream
/// opens. Once streaming, failures arrive as an `Error` event followed
/// by the terminal `Done`.
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(payload): Json<SendRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let user_text = payload.message.trim().to_string();
    if user_text.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    if user_text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message too long (max {MAX_MESSAGE_CHARS} chars)"
        )));
    }

    let model = ctx.model.clone().ok_or(ApiError::ModelUnconfigured)?;
    let conn = ctx.core.open_db()?;

    // The orchestrator re-checks the gate, but rejecting here keeps the
    // refusal a plain 429 instead of a stream that dies immediately.
    if get_usage(&conn)?.is_over_budget() {
        return Err(ApiError::BudgetExceeded);
    }

    let conversation_id = match payload.conversation_id {
        Some(id) => {
            get_conversation(&conn, &id)?
                .ok_or_else(|| ApiError::NotFound(format!("Conversation not found: {id}")))?;
            id
        }
        None => chat::ensure_active_conversation(&conn)?,
    };
    drop(conn);

    let cancel = ctx.core.begin_turn(conversation_id)?;

    let (tx, rx) = mpsc::channel::<StreamEvent>(64);
    let core = ctx.core.clone();
    tokio::task::spawn_blocking(move || {
        let conn = match core.open_db() {
            Ok(conn) => conn,
            Err(e) => {
                let _ = tx.blocking_send(StreamEvent::Error {
                    message: e.to_string(),
                });
                let _ = core.finish_turn(&conversation_id);
                return;
            }
        };

        let mut streaming_marked = false;
        let mut on_event = |event: StreamEvent| {
            if !streaming_marked && matches!(event, StreamEvent::Token { .. }) {
                streaming_marked = true;
                let _ = core.mark_streaming(&conversation_id);
            }
            // A dropped receiver means the client went away; the turn
            // still runs to completion and persists its outcome.
            let _ = tx.blocking_send(event);
        };

        let orchestrator = ChatOrchestrator::new(model.as_ref(), &conn);
        if let Err(e) =
            orchestrator.run_chat_turn(conversation_id, &user_text, &cancel, &mut on_event)
        {
            // Pre-flight race (gate crossed or conversation deleted after
            // the handler checked): surface it on the stream
            let _ = tx.blocking_send(StreamEvent::Error {
                message: e.to_string(),
            });
        }
        let _ = core.finish_turn(&conversation_id);
    });

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse = match Event::default().json_data(&event) {
            Ok(sse) => sse,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode stream event");
                Event::default().data("{}")
            }
        };
        Some((Ok::<_, Infallible>(sse), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `POST /api/chat/:id/cancel` — flag the in-flight turn for
/// cancellation. Reports whether a turn was actually running; partial
/// text already streamed stays persisted either way.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, ApiError> {
    let phase = ctx.core.turn_phase(&conversation_id)?;
    let cancelled = ctx.core.cancel_turn(&conversation_id)?;
    if cancelled {
        tracing::info!(
            conversation_id = %conversation_id,
            phase = ?phase,
            "Cancellation requested"
        );
    }
    Ok(Json(CancelResponse { cancelled }))
}
