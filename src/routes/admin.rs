use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// System configuration and oversight, nested under `/api/admin` and wrapped in
/// `require_role::<Administrators>`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /api/admin/settings/{key}
        // Upserts a system setting such as AUTH_MODE or LEAVE_ADVANCE_DAYS.
        .route("/settings/{key}", put(handlers::update_setting))
        // GET /api/admin/audit-logs?limit=..
        .route("/audit-logs", get(handlers::get_audit_logs))
}
