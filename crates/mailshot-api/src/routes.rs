//! API routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AppState};
use crate::handlers::{admin, attempts, campaigns, clients, health, messages};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .with_state(state.clone());

    let client_routes = Router::new()
        .route("/", get(clients::list_clients).post(clients::create_client))
        .route(
            "/:client_id",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        );

    let message_routes = Router::new()
        .route("/", get(messages::list_messages).post(messages::create_message))
        .route(
            "/:message_id",
            get(messages::get_message)
                .put(messages::update_message)
                .delete(messages::delete_message),
        );

    let campaign_routes = Router::new()
        .route("/", get(campaigns::list_campaigns).post(campaigns::create_campaign))
        .route(
            "/:campaign_id",
            get(campaigns::get_campaign)
                .put(campaigns::update_campaign)
                .delete(campaigns::delete_campaign),
        )
        .route("/:campaign_id/recipients", get(campaigns::list_recipients))
        .route("/:campaign_id/send", post(campaigns::send_campaign))
        .route("/:campaign_id/attempts", get(campaigns::list_campaign_attempts));

    let attempt_routes = Router::new()
        .route("/", get(attempts::list_attempts))
        .route("/counts", get(attempts::count_attempts))
        .route("/latest", get(attempts::latest_attempts));

    let admin_routes =
        Router::new().route("/campaigns/disable", post(admin::disable_campaigns));

    // API v1 routes with authentication
    let api_v1 = Router::new()
        .nest("/clients", client_routes)
        .nest("/messages", message_routes)
        .nest("/campaigns", campaign_routes)
        .nest("/attempts", attempt_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
}
