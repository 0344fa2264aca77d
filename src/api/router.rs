//! HTTP API router.
//!
//! Returns a composable `Router` with every route nested under `/api`.
//! Handlers receive `State<ApiContext>`; a permissive CORS layer lets a
//! browser frontend on another origin talk to the service.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router with the Gemini client from the environment.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build the router from a pre-constructed context. Tests use this to
/// inject a scripted model instead of the Gemini client.
pub fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/conversations",
            get(endpoints::conversations::list).post(endpoints::conversations::create),
        )
        .route(
            "/conversations/:id",
            get(endpoints::conversations::detail).delete(endpoints::conversations::remove),
        )
        .route(
            "/conversations/:id/title",
            put(endpoints::conversations::rename),
        )
        .route(
            "/conversations/:id/activate",
            put(endpoints::conversations::activate),
        )
        .route("/chat/send", post(endpoints::chat::send))
        .route("/chat/:id/cancel", post(endpoints::chat::cancel))
        .route(
            "/documents",
            get(endpoints::documents::list).post(endpoints::documents::upload),
        )
        .route("/documents/stats", get(endpoints::documents::stats))
        .route(
            "/documents/:id",
            get(endpoints::documents::detail).delete(endpoints::documents::remove),
        )
        .route("/documents/:id/pages", get(endpoints::documents::pages))
        .route("/citations/resolve", post(endpoints::citations::resolve))
        .route("/usage", get(endpoints::usage::current))
        .route("/usage/budget", put(endpoints::usage::update_budget))
        .route(
            "/profile",
            get(endpoints::profile::current).put(endpoints::profile::update),
        )
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(CorsLayer::permissive())
}
