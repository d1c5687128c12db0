/**
 * Router Configuration
 *
 * All HTTP routes in one place:
 *
 * - `GET /health`
 * - `POST|DELETE|GET /follow/{target}`
 * - `POST|GET /chat-room/{id}/messages`, `POST /chat-room/{id}/mark-read`
 * - `POST /listings/{id}/view`, `GET /listings/{id}/views`
 * - `GET|POST /realtime/{topic}`, `POST /realtime/{topic}/heartbeat`
 */
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::backend::server::state::AppState;
use crate::backend::{chat, follow, realtime, views};

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/follow/{target}",
            post(follow::handlers::follow)
                .delete(follow::handlers::unfollow)
                .get(follow::handlers::status),
        )
        .route(
            "/chat-room/{id}/messages",
            post(chat::handlers::send_message).get(chat::handlers::list_messages),
        )
        .route("/chat-room/{id}/mark-read", post(chat::handlers::mark_read))
        .route("/listings/{id}/view", post(views::handlers::record_view))
        .route("/listings/{id}/views", get(views::handlers::get_views))
        .route(
            "/realtime/{topic}",
            get(realtime::subscription::subscribe).post(realtime::publish::publish),
        )
        .route("/realtime/{topic}/heartbeat", post(realtime::publish::heartbeat))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}
