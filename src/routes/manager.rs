use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Manager Router Module
///
/// Delegation of approval authority while a manager is away.
pub fn manager_routes() -> Router<AppState> {
    Router::new()
        // GET /api/manager/delegates/search?q=..
        .route(
            "/api/manager/delegates/search",
            get(handlers::search_delegates),
        )
        // POST /api/manager/delegates
        .route("/api/manager/delegates", post(handlers::create_delegation))
}
