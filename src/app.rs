use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/timers",
            get(handlers::list_timers).post(handlers::create_timer),
        )
        .route("/api/timers/quick", post(handlers::quick_timer))
        .route("/api/timers/:id", delete(handlers::remove_timer))
        .route("/api/timers/:id/start", post(handlers::start_timer))
        .route("/api/timers/:id/pause", post(handlers::pause_timer))
        .route("/api/timers/:id/toggle", post(handlers::toggle_timer))
        .route("/api/timers/:id/reset", post(handlers::reset_timer))
        .route("/api/history", get(handlers::get_history))
        .route("/api/alerts", get(handlers::get_alerts))
        .route("/api/alerts/:id/dismiss", post(handlers::dismiss_alert))
        .with_state(state)
}
