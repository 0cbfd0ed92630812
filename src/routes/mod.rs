//! Routers segregated by access level. Each module's router receives its access layer
//! in `create_router`, so no endpoint can be exposed without one.

/// No session required.
pub mod public;

/// Any valid session (`auth_middleware`).
pub mod authenticated;

/// HR and ADMIN (`require_role::<HrStaff>`).
pub mod hr;

/// MANAGER only (`require_role::<Managers>`).
pub mod manager;

/// ADMIN only, nested under `/api/admin`.
pub mod admin;
