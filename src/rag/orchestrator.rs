use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::citation::{extract_citations, Citation};
use super::prompt::build_system_instruction;
use super::tokens::estimate_tokens;
use super::RagError;
use crate::chat;
use crate::db::repository::{
    get_conversation, get_messages, get_usage, insert_message, overwrite_message_text,
    ready_documents, record_usage, touch_conversation,
};
use crate::models::enums::MessageRole;
use crate::models::Message;

/// Placeholder text written over the streaming message when a turn fails.
pub const GENERATION_FAILURE_MESSAGE: &str =
    "I encountered an error processing your request. Please check your API key or try again.";

/// Cooperative cancellation flag shared between the request handler and the
/// blocking stream consumer. Checked between increments; flipping it keeps
/// whatever text already streamed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One prior conversation entry sent to the model.
#[derive(Debug, Clone)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub text: String,
}

/// Everything the model collaborator needs for one turn.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub history: Vec<ModelMessage>,
    pub prompt: String,
}

/// Trait for streaming model generation.
///
/// `on_update` receives the cumulative text after every increment (not the
/// delta); the return value is the final complete text. Implementations
/// check `cancel` between increments and return `RagError::Cancelled`.
pub trait ModelStream {
    fn stream_reply(
        &self,
        request: &ModelRequest,
        cancel: &CancelToken,
        on_update: &mut dyn FnMut(&str),
    ) -> Result<String, RagError>;
}

/// Lifecycle of one chat turn.
///
/// `Idle -> Gated` when the budget gate rejects, otherwise
/// `Idle -> Sending -> Streaming -> Completed | Failed | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Gated,
    Sending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

/// A single streaming event sent to the client.
///
/// `Token` carries the cumulative processed text so far; `Citations` fires
/// whenever the derived citation list grows; `Done` closes every turn,
/// successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    Token {
        text: String,
    },
    Citations {
        citations: Vec<Citation>,
    },
    Done {
        message_id: Uuid,
        phase: TurnPhase,
        text: String,
        citations: Vec<Citation>,
    },
    Error {
        message: String,
    },
}

/// Terminal state of a finished turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub phase: TurnPhase,
    pub message_id: Uuid,
    /// Final message text as stored, markers included.
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Coordinates one conversation turn: budget gate, message bookkeeping,
/// prompt assembly, streaming, citation projection, usage accounting.
pub struct ChatOrchestrator<'a, M: ModelStream + ?Sized> {
    model: &'a M,
    conn: &'a Connection,
}

impl<'a, M: ModelStream + ?Sized> ChatOrchestrator<'a, M> {
    pub fn new(model: &'a M, conn: &'a Connection) -> Self {
        Self { model, conn }
    }

    /// Run a full chat turn for `conversation_id`.
    ///
    /// Returns `Err` only for pre-flight rejections (budget gate, unknown
    /// conversation) where nothing was written. Once the user message is
    /// appended the turn always finishes with an outcome: model failures
    /// overwrite the placeholder with a fixed error text and keep the
    /// already-charged request-side tokens, cancellation keeps the partial
    /// response. Neither rolls anything back.
    pub fn run_chat_turn(
        &self,
        conversation_id: Uuid,
        user_text: &str,
        cancel: &CancelToken,
        on_event: &mut dyn FnMut(StreamEvent),
    ) -> Result<TurnOutcome, RagError> {
        // Step 1: Budget gate, on state before this request's own cost
        let usage = get_usage(self.conn)?;
        if usage.is_over_budget() {
            tracing::info!(
                monthly = usage.monthly,
                budget = usage.budget,
                phase = ?TurnPhase::Gated,
                "Chat request rejected by budget gate"
            );
            return Err(RagError::BudgetExceeded);
        }

        let conversation = get_conversation(self.conn, &conversation_id)?
            .ok_or(RagError::ConversationNotFound(conversation_id))?;

        // Step 2: History is the conversation as it stood before this turn
        let history: Vec<ModelMessage> = get_messages(self.conn, &conversation_id)?
            .into_iter()
            .map(|m| ModelMessage {
                role: m.role,
                text: m.content,
            })
            .collect();

        // Step 3: Append the user message, derive a title if still default,
        // then append the empty placeholder the stream will overwrite
        let now = chat::current_timestamp();
        let user_message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::User,
            content: user_text.to_string(),
            created_at: now,
        };
        insert_message(self.conn, &user_message)?;
        chat::ensure_titled(self.conn, &conversation, user_text)?;

        let placeholder = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::Model,
            content: String::new(),
            created_at: now,
        };
        insert_message(self.conn, &placeholder)?;
        touch_conversation(self.conn, &conversation_id)?;

        // Step 4: Request-side cost is charged before any network call
        record_usage(self.conn, estimate_tokens(user_text))?;

        // Step 5: Assemble the model request from ready documents + history
        let documents = ready_documents(self.conn)?;
        let request = ModelRequest {
            system_instruction: build_system_instruction(&documents),
            history,
            prompt: user_text.to_string(),
        };
        tracing::debug!(
            conversation_id = %conversation_id,
            history_len = request.history.len(),
            ready_documents = documents.len(),
            phase = ?TurnPhase::Sending,
            "Dispatching chat turn to model"
        );

        // Step 6: Stream. Every cumulative update overwrites the placeholder
        // in place, then the citation list is re-derived from the full text
        let placeholder_id = placeholder.id;
        let mut latest = String::new();
        let mut emitted_citations = 0usize;
        let stream_result = self.model.stream_reply(&request, cancel, &mut |cumulative| {
            latest.clear();
            latest.push_str(cumulative);
            if let Err(e) = overwrite_message_text(self.conn, &placeholder_id, cumulative) {
                tracing::warn!(error = %e, "Failed to persist streamed text");
            }
            let processed = extract_citations(cumulative);
            on_event(StreamEvent::Token {
                text: processed.text,
            });
            if processed.citations.len() != emitted_citations {
                emitted_citations = processed.citations.len();
                on_event(StreamEvent::Citations {
                    citations: processed.citations,
                });
            }
        });

        // Step 7: Settle the turn
        match stream_result {
            Ok(final_text) => {
                overwrite_message_text(self.conn, &placeholder_id, &final_text)?;
                record_usage(self.conn, estimate_tokens(&final_text))?;
                touch_conversation(self.conn, &conversation_id)?;

                let processed = extract_citations(&final_text);
                tracing::info!(
                    conversation_id = %conversation_id,
                    chars = final_text.chars().count(),
                    citations = processed.citations.len(),
                    phase = ?TurnPhase::Completed,
                    "Chat turn completed"
                );
                on_event(StreamEvent::Done {
                    message_id: placeholder_id,
                    phase: TurnPhase::Completed,
                    text: processed.text,
                    citations: processed.citations.clone(),
                });
                Ok(TurnOutcome {
                    phase: TurnPhase::Completed,
                    message_id: placeholder_id,
                    text: final_text,
                    citations: processed.citations,
                })
            }
            Err(RagError::Cancelled) => {
                // Partial text is already persisted; charge what streamed
                record_usage(self.conn, estimate_tokens(&latest))?;
                touch_conversation(self.conn, &conversation_id)?;

                let processed = extract_citations(&latest);
                tracing::info!(
                    conversation_id = %conversation_id,
                    chars = latest.chars().count(),
                    phase = ?TurnPhase::Cancelled,
                    "Chat turn cancelled; partial response kept"
                );
                on_event(StreamEvent::Done {
                    message_id: placeholder_id,
                    phase: TurnPhase::Cancelled,
                    text: processed.text,
                    citations: processed.citations.clone(),
                });
                Ok(TurnOutcome {
                    phase: TurnPhase::Cancelled,
                    message_id: placeholder_id,
                    text: latest,
                    citations: processed.citations,
                })
            }
            Err(e) => {
                // No rollback: the request-side charge and the user message
                // stand, only the placeholder text changes
                if let Err(persist_err) =
                    overwrite_message_text(self.conn, &placeholder_id, GENERATION_FAILURE_MESSAGE)
                {
                    tracing::warn!(error = %persist_err, "Failed to write failure text");
                }
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    phase = ?TurnPhase::Failed,
                    "Chat turn failed"
                );
                on_event(StreamEvent::Error {
                    message: e.to_string(),
                });
                on_event(StreamEvent::Done {
                    message_id: placeholder_id,
                    phase: TurnPhase::Failed,
                    text: GENERATION_FAILURE_MESSAGE.to_string(),
                    citations: vec![],
                });
                Ok(TurnOutcome {
                    phase: TurnPhase::Failed,
                    message_id: placeholder_id,
                    text: GENERATION_FAILURE_MESSAGE.to_string(),
                    citations: vec![],
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_conversation, set_budget};
    use crate::db::sqlite::open_memory_database;
    use crate::models::Conversation;
    use std::cell::RefCell;

    /// Scripted model: replays cumulative snapshots, optionally failing or
    /// cancelling itself partway through.
    struct MockModel {
        updates: Vec<String>,
        fail_after: Option<usize>,
        cancel_after: Option<usize>,
        seen_requests: RefCell<Vec<ModelRequest>>,
    }

    impl MockModel {
        fn completing(updates: &[&str]) -> Self {
            Self {
                updates: updates.iter().map(|s| s.to_string()).collect(),
                fail_after: None,
                cancel_after: None,
                seen_requests: RefCell::new(Vec::new()),
            }
        }

        fn failing_after(updates: &[&str], n: usize) -> Self {
            Self {
                fail_after: Some(n),
                ..Self::completing(updates)
            }
        }

        fn cancelling_after(updates: &[&str], n: usize) -> Self {
            Self {
                cancel_after: Some(n),
                ..Self::completing(updates)
            }
        }
    }

    impl ModelStream for MockModel {
        fn stream_reply(
            &self,
            request: &ModelRequest,
            cancel: &CancelToken,
            on_update: &mut dyn FnMut(&str),
        ) -> Result<String, RagError> {
            self.seen_requests.borrow_mut().push(request.clone());
            for (i, update) in self.updates.iter().enumerate() {
                if cancel.is_cancelled() {
                    return Err(RagError::Cancelled);
                }
                if self.fail_after == Some(i) {
                    return Err(RagError::StreamingError("connection reset".into()));
                }
                on_update(update);
                if self.cancel_after == Some(i) {
                    cancel.cancel();
                }
            }
            Ok(self.updates.last().cloned().unwrap_or_default())
        }
    }

    fn setup_conversation(conn: &Connection) -> Uuid {
        let now = chat::current_timestamp();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            title: "New Conversation".to_string(),
            created_at: now,
            updated_at: now,
        };
        insert_conversation(conn, &conversation).unwrap();
        conversation.id
    }

    #[test]
    fn completed_turn_stores_user_and_final_model_message() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        let model = MockModel::completing(&["Hel", "Hello there [Source: a.txt]"]);

        let orchestrator = ChatOrchestrator::new(&model, &conn);
        let outcome = orchestrator
            .run_chat_turn(conv_id, "hi", &CancelToken::new(), &mut |_| {})
            .unwrap();

        assert_eq!(outcome.phase, TurnPhase::Completed);
        assert_eq!(outcome.citations.len(), 1);

        let messages = get_messages(&conn, &conv_id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, MessageRole::Model);
        assert_eq!(messages[1].content, "Hello there [Source: a.txt]");
        assert_eq!(messages[1].id, outcome.message_id);
    }

    #[test]
    fn streaming_overwrites_placeholder_instead_of_appending() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        let model = MockModel::completing(&["A", "AB", "ABC"]);

        let orchestrator = ChatOrchestrator::new(&model, &conn);
        orchestrator
            .run_chat_turn(conv_id, "go", &CancelToken::new(), &mut |_| {})
            .unwrap();

        let messages = get_messages(&conn, &conv_id).unwrap();
        assert_eq!(messages[1].content, "ABC");
    }

    #[test]
    fn first_user_message_titles_the_conversation() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        let model = MockModel::completing(&["ok"]);

        let orchestrator = ChatOrchestrator::new(&model, &conn);
        orchestrator
            .run_chat_turn(
                conv_id,
                "Summarize the quarterly revenue report for me",
                &CancelToken::new(),
                &mut |_| {},
            )
            .unwrap();

        let conversation = get_conversation(&conn, &conv_id).unwrap().unwrap();
        assert_eq!(conversation.title, "Summarize the quarterly revenu...");
    }

    #[test]
    fn request_and_response_are_charged_as_two_events() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        // "12345678" -> 2 tokens; "123456789" -> 3 tokens
        let model = MockModel::completing(&["123456789"]);

        let before = get_usage(&conn).unwrap();
        let orchestrator = ChatOrchestrator::new(&model, &conn);
        orchestrator
            .run_chat_turn(conv_id, "12345678", &CancelToken::new(), &mut |_| {})
            .unwrap();

        let after = get_usage(&conn).unwrap();
        assert_eq!(after.monthly, before.monthly + 2 + 3);
        assert_eq!(after.daily, before.daily + 2 + 3);
        assert_eq!(after.yearly, before.yearly + 2 + 3);
    }

    #[test]
    fn gate_rejects_when_monthly_meets_budget() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        let usage = get_usage(&conn).unwrap();
        set_budget(&conn, usage.monthly).unwrap();

        let model = MockModel::completing(&["never sent"]);
        let orchestrator = ChatOrchestrator::new(&model, &conn);
        let result = orchestrator.run_chat_turn(conv_id, "hi", &CancelToken::new(), &mut |_| {});

        assert!(matches!(result, Err(RagError::BudgetExceeded)));
        assert!(get_messages(&conn, &conv_id).unwrap().is_empty());
        assert_eq!(get_usage(&conn).unwrap().monthly, usage.monthly);
        assert!(model.seen_requests.borrow().is_empty());
    }

    #[test]
    fn gate_checks_state_before_this_requests_cost() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        let usage = get_usage(&conn).unwrap();
        // One token under the ceiling: the send proceeds, and its own cost
        // may push the ledger over for the next turn
        set_budget(&conn, usage.monthly + 1).unwrap();

        let model = MockModel::completing(&["a long enough reply"]);
        let orchestrator = ChatOrchestrator::new(&model, &conn);
        orchestrator
            .run_chat_turn(conv_id, "hello", &CancelToken::new(), &mut |_| {})
            .unwrap();

        let result = orchestrator.run_chat_turn(conv_id, "again", &CancelToken::new(), &mut |_| {});
        assert!(matches!(result, Err(RagError::BudgetExceeded)));
    }

    #[test]
    fn failure_writes_fixed_error_text_and_keeps_request_charge() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        let model = MockModel::failing_after(&["partial text"], 1);

        let before = get_usage(&conn).unwrap();
        let orchestrator = ChatOrchestrator::new(&model, &conn);
        let outcome = orchestrator
            .run_chat_turn(conv_id, "12345678", &CancelToken::new(), &mut |_| {})
            .unwrap();

        assert_eq!(outcome.phase, TurnPhase::Failed);
        let messages = get_messages(&conn, &conv_id).unwrap();
        assert_eq!(messages[1].content, GENERATION_FAILURE_MESSAGE);

        // Request-side tokens stay charged; no response-side charge
        let after = get_usage(&conn).unwrap();
        assert_eq!(after.monthly, before.monthly + 2);
    }

    #[test]
    fn cancellation_keeps_partial_text() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        let model = MockModel::cancelling_after(&["partial ans", "full answer"], 0);

        let orchestrator = ChatOrchestrator::new(&model, &conn);
        let outcome = orchestrator
            .run_chat_turn(conv_id, "hi", &CancelToken::new(), &mut |_| {})
            .unwrap();

        assert_eq!(outcome.phase, TurnPhase::Cancelled);
        assert_eq!(outcome.text, "partial ans");
        let messages = get_messages(&conn, &conv_id).unwrap();
        assert_eq!(messages[1].content, "partial ans");
    }

    #[test]
    fn unknown_conversation_is_rejected_before_any_write() {
        let conn = open_memory_database().unwrap();
        let model = MockModel::completing(&["x"]);
        let before = get_usage(&conn).unwrap();

        let orchestrator = ChatOrchestrator::new(&model, &conn);
        let result =
            orchestrator.run_chat_turn(Uuid::new_v4(), "hi", &CancelToken::new(), &mut |_| {});

        assert!(matches!(result, Err(RagError::ConversationNotFound(_))));
        assert_eq!(get_usage(&conn).unwrap().monthly, before.monthly);
    }

    #[test]
    fn history_excludes_the_current_turn() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        let now = chat::current_timestamp();
        insert_message(
            &conn,
            &Message {
                id: Uuid::new_v4(),
                conversation_id: conv_id,
                role: MessageRole::Model,
                content: "Hello! How can I help?".to_string(),
                created_at: now,
            },
        )
        .unwrap();

        let model = MockModel::completing(&["fine"]);
        let orchestrator = ChatOrchestrator::new(&model, &conn);
        orchestrator
            .run_chat_turn(conv_id, "how are you", &CancelToken::new(), &mut |_| {})
            .unwrap();

        let seen = model.seen_requests.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].history.len(), 1);
        assert_eq!(seen[0].history[0].text, "Hello! How can I help?");
        assert_eq!(seen[0].prompt, "how are you");
        assert!(seen[0].system_instruction.contains("INSTRUCTIONS:"));
    }

    #[test]
    fn events_carry_processed_text_and_terminal_done() {
        let conn = open_memory_database().unwrap();
        let conv_id = setup_conversation(&conn);
        let model =
            MockModel::completing(&["Revenue", "Revenue grew [Source: report.pdf, Page: 3]."]);

        let mut events: Vec<StreamEvent> = Vec::new();
        let orchestrator = ChatOrchestrator::new(&model, &conn);
        orchestrator
            .run_chat_turn(conv_id, "revenue?", &CancelToken::new(), &mut |e| {
                events.push(e)
            })
            .unwrap();

        // Two token updates, one citation update, one done
        let tokens: Vec<&StreamEvent> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Token { .. }))
            .collect();
        assert_eq!(tokens.len(), 2);
        match tokens[1] {
            StreamEvent::Token { text } => assert_eq!(text, "Revenue grew [1]."),
            _ => unreachable!(),
        }

        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::Citations { citations } if citations.len() == 1)));

        match events.last().unwrap() {
            StreamEvent::Done {
                phase,
                text,
                citations,
                ..
            } => {
                assert_eq!(*phase, TurnPhase::Completed);
                assert_eq!(text, "Revenue grew [1].");
                assert_eq!(citations[0].document_name_hint, "report.pdf");
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }
}
