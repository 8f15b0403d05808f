use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::{channels, handlers, middleware::metrics_middleware, settings, sync, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let dashboard_dir = state.config().server.dashboard_dir.clone();

    // API routes
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::get_metrics))
        // Channels
        .route(
            "/channels",
            get(channels::list_channels).post(channels::create_channel),
        )
        .route(
            "/channels/{id}",
            get(channels::get_channel)
                .put(channels::update_channel)
                .delete(channels::delete_channel),
        )
        .route("/channels/{id}/pause", post(channels::pause_channel))
        // Settings
        .route(
            "/settings",
            get(settings::get_settings).put(settings::save_settings),
        )
        // Sync runs
        .route("/sync", post(sync::trigger_sync))
        .route("/sync/status", get(sync::get_status))
        // Real-time events and commands
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    // Serve dashboard with SPA fallback
    let index_path = dashboard_dir.join("index.html");
    let serve_dir = ServeDir::new(&dashboard_dir).fallback(ServeFile::new(index_path));

    Router::new()
        .nest("/api/v1", api_routes)
        .fallback_service(serve_dir)
        .layer(TraceLayer::new_for_http())
}
