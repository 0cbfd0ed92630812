use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// HR Router Module
///
/// Employee administration and calendar maintenance for HR staff and administrators.
pub fn hr_routes() -> Router<AppState> {
    Router::new()
        // GET /api/hr/employees?department=..
        .route("/api/hr/employees", get(handlers::list_employees))
        // POST /api/hr/employees/password
        // The new password is hashed before it reaches the repository.
        .route(
            "/api/hr/employees/password",
            post(handlers::reset_employee_password),
        )
        // POST /api/hr/working-saturdays
        // One override per date; a duplicate answers 409.
        .route(
            "/api/hr/working-saturdays",
            post(handlers::create_working_saturday),
        )
}
