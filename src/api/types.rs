//! Shared types for the HTTP API layer.

use std::sync::Arc;

use crate::core_state::CoreState;
use crate::rag::gemini::GeminiClient;
use crate::rag::orchestrator::ModelStream;

/// Shared context for all API routes.
///
/// Wraps `CoreState` plus the streaming model client. The client is
/// `None` when no API key is configured; every route except chat send
/// keeps working in that state.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub model: Option<Arc<dyn ModelStream + Send + Sync>>,
}

impl ApiContext {
    /// Build a context with the Gemini client read from the environment.
    pub fn new(core: Arc<CoreState>) -> Self {
        let model: Option<Arc<dyn ModelStream + Send + Sync>> = match GeminiClient::from_env() {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Chat sends disabled until a model is configured");
                None
            }
        };
        Self { core, model }
    }

    /// Build a context around an explicit model implementation. Tests use
    /// this to substitute a scripted stream for the Gemini client.
    pub fn with_model(core: Arc<CoreState>, model: Arc<dyn ModelStream + Send + Sync>) -> Self {
        Self {
            core,
            model: Some(model),
        }
    }
}
