//! Shared application state for the HTTP API.
//!
//! `CoreState` holds the resolved database path and the registry of
//! in-flight chat turns. Every API operation opens its own short-lived
//! SQLite connection through [`CoreState::open_db`]; only the turn
//! registry lives in memory, so a restart never leaves stale state
//! behind.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use rusqlite::Connection;
use uuid::Uuid;

use crate::config;
use crate::db::{self, DatabaseError};
use crate::rag::orchestrator::{CancelToken, TurnPhase};

/// Errors from shared-state operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,

    #[error("A reply is already streaming for conversation {0}")]
    ConversationBusy(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// One in-flight chat turn.
struct ActiveTurn {
    phase: TurnPhase,
    cancel: CancelToken,
}

/// Application-wide shared state.
pub struct CoreState {
    db_path: PathBuf,
    /// At most one active turn per conversation.
    turns: Mutex<HashMap<Uuid, ActiveTurn>>,
}

impl CoreState {
    /// Creates state pointing at the default database location.
    pub fn new() -> Self {
        Self::with_db_path(config::database_path())
    }

    /// Creates state backed by an explicit database file.
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            turns: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a connection to the application database, running any
    /// pending migrations.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        let conn = db::open_database(&self.db_path)?;
        Ok(conn)
    }

    // ═══════════════════════════════════════════════════════════════
    // Turn registry
    // ═══════════════════════════════════════════════════════════════

    /// Registers a new turn for `conversation_id` and hands back its
    /// cancellation token.
    ///
    /// Fails with [`CoreError::ConversationBusy`] while a previous turn
    /// for the same conversation is still in flight.
    pub fn begin_turn(&self, conversation_id: Uuid) -> Result<CancelToken, CoreError> {
        let mut turns = self.turns.lock().map_err(|_| CoreError::LockPoisoned)?;
        if turns.contains_key(&conversation_id) {
            return Err(CoreError::ConversationBusy(conversation_id));
        }
        let cancel = CancelToken::new();
        turns.insert(
            conversation_id,
            ActiveTurn {
                phase: TurnPhase::Sending,
                cancel: cancel.clone(),
            },
        );
        Ok(cancel)
    }

    /// Marks a registered turn as streaming. No-op if the turn has
    /// already finished.
    pub fn mark_streaming(&self, conversation_id: &Uuid) -> Result<(), CoreError> {
        let mut turns = self.turns.lock().map_err(|_| CoreError::LockPoisoned)?;
        if let Some(turn) = turns.get_mut(conversation_id) {
            turn.phase = TurnPhase::Streaming;
        }
        Ok(())
    }

    /// Removes the turn from the registry once it has completed,
    /// failed, or been cancelled.
    pub fn finish_turn(&self, conversation_id: &Uuid) -> Result<(), CoreError> {
        let mut turns = self.turns.lock().map_err(|_| CoreError::LockPoisoned)?;
        turns.remove(conversation_id);
        Ok(())
    }

    /// Requests cancellation of the in-flight turn, if any. Returns
    /// whether a turn was actually running.
    pub fn cancel_turn(&self, conversation_id: &Uuid) -> Result<bool, CoreError> {
        let turns = self.turns.lock().map_err(|_| CoreError::LockPoisoned)?;
        match turns.get(conversation_id) {
            Some(turn) => {
                turn.cancel.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current phase of the conversation's turn, or [`TurnPhase::Idle`]
    /// when nothing is in flight.
    pub fn turn_phase(&self, conversation_id: &Uuid) -> Result<TurnPhase, CoreError> {
        let turns = self.turns.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(turns
            .get(conversation_id)
            .map(|turn| turn.phase)
            .unwrap_or(TurnPhase::Idle))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════
