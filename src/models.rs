use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The closed set of user roles, stored as the Postgres enum `user_role`.
/// Authorization checks match on this exhaustively (see `auth::RolePolicy`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    Employee,
    Manager,
    Hr,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Employee => "EMPLOYEE",
            Role::Manager => "MANAGER",
            Role::Hr => "HR",
            Role::Admin => "ADMIN",
        }
    }
}

/// User
///
/// Full row from the `users` table, used internally by session resolution and login.
/// The credential hash never leaves the server.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    // Employee code, e.g. "EMP0042". Unique.
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
    // Self-referential FK; never equal to `id`.
    pub manager_id: Option<Uuid>,
}

/// UserProfile
///
/// Output schema for `GET /api/profile` and the HR employee listing. Joined with the
/// manager's row to expose a display name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub department: Option<String>,
    pub is_active: bool,
    pub manager_id: Option<Uuid>,
    #[sqlx(default)]
    pub manager_name: Option<String>,
}

/// DelegateCandidate
///
/// A row returned by the manager's delegate search.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DelegateCandidate {
    pub id: Uuid,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub department: Option<String>,
}

/// SystemSetting
///
/// A key/value configuration row. Values are strings; callers parse and default them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// WorkingSaturday
///
/// A calendar override marking a Saturday as a working day with credited hours.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WorkingSaturday {
    pub id: Uuid,
    #[ts(type = "string")]
    #[schema(value_type = String, format = Date)]
    pub work_date: NaiveDate,
    #[ts(type = "string")]
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[ts(type = "string")]
    #[schema(value_type = String, example = "13:00:00")]
    pub end_time: NaiveTime,
    pub hours: f64,
    pub description: Option<String>,
}

/// Delegation
///
/// Temporary grant of a manager's approval authority to another user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Delegation {
    pub id: Uuid,
    pub manager_id: Uuid,
    pub delegate_id: Uuid,
    #[ts(type = "string")]
    #[schema(value_type = String, format = Date)]
    pub start_date: NaiveDate,
    #[ts(type = "string")]
    #[schema(value_type = String, format = Date)]
    pub end_date: NaiveDate,
    pub is_active: bool,
}

/// AuditLogEntry
///
/// Raw row from the append-only `audit_logs` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    #[schema(value_type = Object)]
    pub new_values: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---
//
// Required fields are `Option` so handlers can answer a precise 400 instead of
// relying on the extractor's generic rejection.

/// LoginRequest
///
/// Input payload for local credential login (POST /api/auth/login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    pub employee_id: Option<String>,
    pub password: Option<String>,
}

/// AuthEventRequest
///
/// Input payload for POST /api/auth/log. `action` is `LOGIN` or `LOGOUT`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthEventRequest {
    pub action: Option<String>,
}

/// ResetPasswordRequest
///
/// Input payload for POST /api/hr/employees/password.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ResetPasswordRequest {
    pub user_id: Option<String>,
    pub new_password: Option<String>,
}

/// CreateWorkingSaturdayRequest
///
/// Input payload for POST /api/hr/working-saturdays. Dates are `YYYY-MM-DD`, times `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateWorkingSaturdayRequest {
    pub work_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub hours: Option<f64>,
    pub description: Option<String>,
}

/// CreateDelegationRequest
///
/// Input payload for POST /api/manager/delegates.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateDelegationRequest {
    pub delegate_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// UpdateSettingRequest
///
/// Input payload for PUT /api/admin/settings/{key}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateSettingRequest {
    pub value: Option<String>,
}

// --- Query Parameters ---

/// Accepted query parameters for GET /api/manager/delegates/search.
#[derive(Debug, Deserialize, IntoParams, Default)]
pub struct DelegateSearchParams {
    /// Substring matched against names and employee codes. At least 2 characters.
    pub q: Option<String>,
}

/// Accepted query parameters for GET /api/working-saturdays/range.
#[derive(Debug, Deserialize, IntoParams, Default)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Accepted query parameters for GET /api/hr/employees.
#[derive(Debug, Deserialize, IntoParams, Default)]
pub struct EmployeeFilter {
    pub department: Option<String>,
}

/// Accepted query parameters for GET /api/admin/audit-logs.
#[derive(Debug, Deserialize, IntoParams, Default)]
pub struct AuditLogParams {
    /// Number of entries, clamped to 1..=200. Defaults to 50.
    pub limit: Option<i64>,
}

// --- Response Payloads (Output Schemas) ---

/// LoginResponse
///
/// Issued session token plus the identity it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

/// SessionUser
///
/// The principal carried by a session: id, role and employee code.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionUser {
    pub id: Uuid,
    pub employee_id: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DelegateCheck {
    pub is_delegate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthEventRecorded {
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PasswordResetResult {
    pub user_id: Uuid,
}
