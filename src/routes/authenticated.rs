use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes open to any active user with a valid session. The `auth_middleware` layer
/// rejects anonymous requests with 401 before any handler or data access runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/auth/delegate-check
        // Whether the caller holds a delegation covering today.
        .route("/api/auth/delegate-check", get(handlers::delegate_check))
        // POST /api/auth/log
        // Client-reported LOGIN / LOGOUT events.
        .route("/api/auth/log", post(handlers::log_auth_event))
        // GET /api/hr/departments
        // Used by filters across the UI, so not restricted to HR.
        .route("/api/hr/departments", get(handlers::get_departments))
        .route("/api/profile", get(handlers::get_profile))
        .route("/api/settings/rules", get(handlers::get_leave_rules))
}
