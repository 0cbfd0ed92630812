use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod settings;

// Routing segregated by access level (public, session, HR, manager, admin).
pub mod routes;
use auth::{Administrators, HrStaff, Managers, auth_middleware, require_role};
use routes::{admin, authenticated, hr, manager, public};

// --- Public Re-exports ---

pub use audit::{AuditLogger, AuditState, MockAuditLog, PostgresAuditLog};
pub use config::AppConfig;
pub use db::{Database, DbError};
pub use error::{ApiError, ApiResponse};
pub use repository::{PostgresRepository, Repository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_auth_mode, handlers::login, handlers::get_working_saturdays_range,
        handlers::delegate_check, handlers::log_auth_event, handlers::get_departments,
        handlers::get_profile, handlers::get_leave_rules, handlers::list_employees,
        handlers::reset_employee_password, handlers::create_working_saturday,
        handlers::search_delegates, handlers::create_delegation, handlers::update_setting,
        handlers::get_audit_logs
    ),
    components(
        schemas(
            models::Role, models::UserProfile, models::DelegateCandidate, models::SystemSetting,
            models::WorkingSaturday, models::Delegation, models::AuditLogEntry,
            models::LoginRequest, models::LoginResponse, models::SessionUser,
            models::AuthEventRequest, models::AuthEventRecorded, models::ResetPasswordRequest,
            models::PasswordResetResult, models::CreateWorkingSaturdayRequest,
            models::CreateDelegationRequest, models::UpdateSettingRequest, models::DelegateCheck,
            settings::AuthMode, settings::AuthModeFlags, settings::LeaveRules,
        )
    ),
    tags(
        (name = "leave-portal", description = "Leave Management Portal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, cloneable container of shared services. Handlers and extractors pull
/// the part they need through the `FromRef` impls below.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer over the shared `Database` gateway.
    pub repo: RepositoryState,
    /// Append-only audit sink.
    pub audit: AuditState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AuditState {
    fn from_ref(app_state: &AppState) -> AuditState {
        app_state.audit.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, applies scoped access layers and the global
/// observability stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Any valid session.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Role-scoped routers. The layer answers 401/403 before the handler (and its body
        // extractor) runs; handlers repeat the check through their `Authorized<P>` argument.
        .merge(hr::hr_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_role::<HrStaff>,
        )))
        .merge(manager::manager_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_role::<Managers>,
        )))
        .nest(
            "/api/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_role::<Administrators>,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its method, URI
/// and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
