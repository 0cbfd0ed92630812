use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: liveness, the login page's capability flags,
/// local login itself and the shared working-Saturday calendar.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. Never touches the database.
        .route("/health", get(|| async { "ok" }))
        // GET /api/auth/mode
        // Always 200; falls back to LOCAL when the setting is unreadable.
        .route("/api/auth/mode", get(handlers::get_auth_mode))
        // POST /api/auth/login
        .route("/api/auth/login", post(handlers::login))
        // GET /api/working-saturdays/range?startDate=..&endDate=..
        .route(
            "/api/working-saturdays/range",
            get(handlers::get_working_saturdays_range),
        )
}
