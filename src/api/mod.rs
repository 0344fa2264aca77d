//! HTTP API for the chat service.
//!
//! Module map:
//! - `types` — shared request context (`ApiContext`)
//! - `error` — `ApiError` and its JSON error body
//! - `endpoints/` — one file per resource (conversations, chat,
//!   documents, citations, usage, profile, health)
//! - `router` — route table, nested under `/api`
//! - `server` — bind/spawn/shutdown lifecycle

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::{api_router, api_router_with_ctx};
pub use server::{start_server, ApiServer};
pub use types::ApiContext;
