use crate::{
    AppState,
    audit::{AuditAction, NewAuditEntry, record_best_effort},
    auth::{self, Administrators, AuthUser, Authorized, HrStaff, Managers},
    error::{ApiError, ApiResponse, ApiResult},
    models::{
        AuditLogEntry, AuditLogParams, AuthEventRecorded, AuthEventRequest,
        CreateDelegationRequest, CreateWorkingSaturdayRequest, DateRangeParams, DelegateCandidate,
        DelegateCheck, DelegateSearchParams, Delegation, EmployeeFilter, LoginRequest,
        LoginResponse, PasswordResetResult, ResetPasswordRequest, SessionUser, SystemSetting,
        UpdateSettingRequest, UserProfile, WorkingSaturday,
    },
    repository::{NewDelegation, NewWorkingSaturday, RepositoryState},
    settings::{AUTH_MODE_KEY, AuthModeFlags, LeaveRules},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use chrono::{Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use uuid::Uuid;

/// Upper bound on delegate search results.
pub const DELEGATE_SEARCH_LIMIT: i64 = 10;
/// Queries shorter than this return an empty result without touching the store.
pub const MIN_SEARCH_CHARS: usize = 2;
pub const MIN_PASSWORD_LENGTH: usize = 8;

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 200;

// --- Helpers ---

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ApiError::BadRequest("invalid_date"))
}

fn parse_time(raw: &str) -> Result<NaiveTime, ApiError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ApiError::BadRequest("invalid_time"))
}

/// Wraps a user-supplied fragment in `%...%`, escaping LIKE metacharacters so they
/// match literally.
fn contains_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Reads the auth mode, serving the LOCAL fallback when the store cannot answer.
async fn resolve_auth_mode(repo: &RepositoryState) -> AuthModeFlags {
    match repo.get_settings(&[AUTH_MODE_KEY]).await {
        Ok(settings) => AuthModeFlags::from_settings(&settings),
        Err(e) => {
            tracing::warn!(error = %e, "Auth mode unreadable, serving LOCAL fallback");
            AuthModeFlags::fallback()
        }
    }
}

// --- Public Handlers ---

/// get_auth_mode
///
/// [Public Route] Login-page capability flags. Never fails: an unreadable setting
/// yields the LOCAL fallback.
#[utoipa::path(
    get,
    path = "/api/auth/mode",
    responses((status = 200, description = "Auth UI flags (enveloped)", body = AuthModeFlags))
)]
pub async fn get_auth_mode(State(state): State<AppState>) -> ApiResult<AuthModeFlags> {
    Ok(ApiResponse::ok(resolve_auth_mode(&state.repo).await))
}

/// login
///
/// [Public Route] Local credential login. Only offered when the auth mode checks
/// passwords locally (LOCAL or HYBRID).
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued (enveloped)", body = LoginResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Local login disabled")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(payload) = payload?;
    let (Some(employee_id), Some(password)) = (
        non_blank(payload.employee_id),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::BadRequest("missing_required_fields"));
    };

    let flags = resolve_auth_mode(&state.repo).await;
    if !flags.auth_mode.allows_local_login() {
        return Err(ApiError::ForbiddenBecause("local_login_disabled"));
    }

    // Unknown ids and hashless accounts still pay for one argon2 verification.
    let user = state
        .repo
        .find_user_by_employee_id(&employee_id)
        .await?
        .filter(|user| user.is_active);
    let hash = user.as_ref().and_then(|user| user.password_hash.as_deref());
    let matched = auth::verify_password(&password, hash.unwrap_or_else(|| auth::dummy_hash()));
    let verified = matched && hash.is_some();
    let user = user.filter(|_| verified);

    let Some(user) = user else {
        record_best_effort(
            &state.audit,
            NewAuditEntry::new(None, AuditAction::LoginFailed).target("users", &employee_id),
        )
        .await;
        return Err(ApiError::InvalidCredentials);
    };

    let (token, expires_at) = auth::issue_token(
        user.id,
        &state.config.jwt_secret,
        state.config.session_ttl_hours,
    )?;

    record_best_effort(
        &state.audit,
        NewAuditEntry::new(Some(user.id), AuditAction::Login).target("users", user.id),
    )
    .await;
    tracing::info!(user_id = %user.id, "Local login succeeded");

    Ok(ApiResponse::ok(LoginResponse {
        token,
        expires_at,
        user: SessionUser {
            id: user.id,
            employee_id: user.employee_id,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
        },
    }))
}

/// get_working_saturdays_range
///
/// [Public Route] Working-Saturday overrides between two dates, inclusive.
#[utoipa::path(
    get,
    path = "/api/working-saturdays/range",
    params(DateRangeParams),
    responses(
        (status = 200, description = "Overrides ordered by date (enveloped)", body = [WorkingSaturday]),
        (status = 400, description = "Missing or invalid dates")
    )
)]
pub async fn get_working_saturdays_range(
    State(state): State<AppState>,
    params: Result<Query<DateRangeParams>, QueryRejection>,
) -> ApiResult<Vec<WorkingSaturday>> {
    let Query(params) = params?;
    let (Some(start), Some(end)) = (non_blank(params.start_date), non_blank(params.end_date)) else {
        return Err(ApiError::BadRequest("missing_required_fields"));
    };
    let start = parse_date(&start)?;
    let end = parse_date(&end)?;
    if start > end {
        return Err(ApiError::BadRequest("invalid_date_range"));
    }

    let days = state.repo.working_saturdays_between(start, end).await?;
    Ok(ApiResponse::ok(days))
}

// --- Authenticated Handlers ---

/// delegate_check
///
/// [Authenticated Route] Whether the caller currently holds a delegation.
#[utoipa::path(
    get,
    path = "/api/auth/delegate-check",
    responses((status = 200, description = "Delegate flag (enveloped)", body = DelegateCheck))
)]
pub async fn delegate_check(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<DelegateCheck> {
    let today = Utc::now().date_naive();
    let is_delegate = state.repo.is_active_delegate(id, today).await?;
    Ok(ApiResponse::ok(DelegateCheck { is_delegate }))
}

/// log_auth_event
///
/// [Authenticated Route] Records a LOGIN or LOGOUT completed by the client, e.g. after
/// an Azure AD or LDAP sign-in handled outside this service.
#[utoipa::path(
    post,
    path = "/api/auth/log",
    request_body = AuthEventRequest,
    responses(
        (status = 200, description = "Recorded (enveloped)", body = AuthEventRecorded),
        (status = 400, description = "Unknown action")
    )
)]
pub async fn log_auth_event(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<AuthEventRequest>, JsonRejection>,
) -> ApiResult<AuthEventRecorded> {
    let Json(payload) = payload?;
    let action = match payload.action.as_deref().map(str::trim) {
        Some("LOGIN") => AuditAction::Login,
        Some("LOGOUT") => AuditAction::Logout,
        _ => return Err(ApiError::BadRequest("invalid_action")),
    };

    state
        .audit
        .record(NewAuditEntry::new(Some(id), action).target("users", id))
        .await?;

    Ok(ApiResponse::ok(AuthEventRecorded {
        action: action.as_str().to_string(),
    }))
}

/// get_departments
///
/// [Authenticated Route] Distinct department names, sorted.
#[utoipa::path(
    get,
    path = "/api/hr/departments",
    responses((status = 200, description = "Departments (enveloped)", body = [String]))
)]
pub async fn get_departments(
    _user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Vec<String>> {
    Ok(ApiResponse::ok(state.repo.list_departments().await?))
}

/// get_profile
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Profile (enveloped)", body = UserProfile),
        (status = 404, description = "Profile row missing")
    )
)]
pub async fn get_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<UserProfile> {
    match state.repo.get_profile(id).await? {
        Some(profile) => Ok(ApiResponse::ok(profile)),
        None => Err(ApiError::NotFound),
    }
}

/// get_leave_rules
///
/// [Authenticated Route] Leave-policy thresholds, each defaulting to 3 days when the
/// row is missing or unparsable.
#[utoipa::path(
    get,
    path = "/api/settings/rules",
    responses((status = 200, description = "Leave rules (enveloped)", body = LeaveRules))
)]
pub async fn get_leave_rules(
    _user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<LeaveRules> {
    let settings = state.repo.get_settings(&LeaveRules::KEYS).await?;
    Ok(ApiResponse::ok(LeaveRules::from_settings(&settings)))
}

// --- HR Handlers ---

/// list_employees
///
/// [HR Route] Employee profiles, optionally filtered by department.
#[utoipa::path(
    get,
    path = "/api/hr/employees",
    params(EmployeeFilter),
    responses(
        (status = 200, description = "Employees (enveloped)", body = [UserProfile]),
        (status = 403, description = "Not HR or ADMIN")
    )
)]
pub async fn list_employees(
    _auth: Authorized<HrStaff>,
    State(state): State<AppState>,
    filter: Result<Query<EmployeeFilter>, QueryRejection>,
) -> ApiResult<Vec<UserProfile>> {
    let Query(filter) = filter?;
    let employees = state.repo.list_employees(non_blank(filter.department)).await?;
    Ok(ApiResponse::ok(employees))
}

/// reset_employee_password
///
/// [HR Route] Sets a new password for any employee. The role check runs in the
/// extractor, before the body is even parsed.
#[utoipa::path(
    post,
    path = "/api/hr/employees/password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset (enveloped)", body = PasswordResetResult),
        (status = 400, description = "Missing or invalid fields"),
        (status = 403, description = "Not HR or ADMIN"),
        (status = 404, description = "No such user")
    )
)]
pub async fn reset_employee_password(
    Authorized { user: caller, .. }: Authorized<HrStaff>,
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<PasswordResetResult> {
    let Json(payload) = payload?;
    let (Some(user_id), Some(new_password)) = (
        non_blank(payload.user_id),
        payload.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::BadRequest("missing_required_fields"));
    };
    let user_id = Uuid::parse_str(&user_id).map_err(|_| ApiError::BadRequest("invalid_user_id"))?;
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest("password_too_short"));
    }

    let hash = auth::hash_password(&new_password)?;
    if !state.repo.update_password(user_id, &hash).await? {
        return Err(ApiError::NotFound);
    }

    record_best_effort(
        &state.audit,
        NewAuditEntry::new(Some(caller.id), AuditAction::PasswordReset)
            .target("users", user_id)
            .values(serde_json::json!({ "resetBy": caller.employee_id })),
    )
    .await;

    Ok(ApiResponse::ok(PasswordResetResult { user_id }))
}

/// create_working_saturday
///
/// [HR Route] Declares a Saturday as a working day. When `hours` is omitted the span
/// between start and end is credited.
#[utoipa::path(
    post,
    path = "/api/hr/working-saturdays",
    request_body = CreateWorkingSaturdayRequest,
    responses(
        (status = 200, description = "Created (enveloped)", body = WorkingSaturday),
        (status = 400, description = "Invalid date, times or hours"),
        (status = 409, description = "Date already declared")
    )
)]
pub async fn create_working_saturday(
    Authorized { user: caller, .. }: Authorized<HrStaff>,
    State(state): State<AppState>,
    payload: Result<Json<CreateWorkingSaturdayRequest>, JsonRejection>,
) -> ApiResult<WorkingSaturday> {
    let Json(payload) = payload?;
    let (Some(date), Some(start), Some(end)) = (
        non_blank(payload.work_date),
        non_blank(payload.start_time),
        non_blank(payload.end_time),
    ) else {
        return Err(ApiError::BadRequest("missing_required_fields"));
    };

    let work_date = parse_date(&date)?;
    if work_date.weekday() != Weekday::Sat {
        return Err(ApiError::BadRequest("not_a_saturday"));
    }
    let start_time = parse_time(&start)?;
    let end_time = parse_time(&end)?;
    if start_time >= end_time {
        return Err(ApiError::BadRequest("invalid_time_range"));
    }

    let hours = payload
        .hours
        .unwrap_or_else(|| (end_time - start_time).num_minutes() as f64 / 60.0);
    if !(hours > 0.0 && hours <= 24.0) {
        return Err(ApiError::BadRequest("invalid_hours"));
    }

    let day = state
        .repo
        .create_working_saturday(NewWorkingSaturday {
            work_date,
            start_time,
            end_time,
            hours,
            description: non_blank(payload.description),
        })
        .await?;

    record_best_effort(
        &state.audit,
        NewAuditEntry::new(Some(caller.id), AuditAction::WorkingSaturdayCreated)
            .target("working_saturdays", day.id)
            .values(serde_json::json!({ "workDate": day.work_date, "hours": day.hours })),
    )
    .await;

    Ok(ApiResponse::ok(day))
}

// --- Manager Handlers ---

/// search_delegates
///
/// [Manager Route] Candidate delegates matching `q`. Short queries short-circuit to an
/// empty list without a store call.
#[utoipa::path(
    get,
    path = "/api/manager/delegates/search",
    params(DelegateSearchParams),
    responses(
        (status = 200, description = "Up to 10 candidates (enveloped)", body = [DelegateCandidate]),
        (status = 403, description = "Not a manager")
    )
)]
pub async fn search_delegates(
    Authorized { user, .. }: Authorized<Managers>,
    State(state): State<AppState>,
    params: Result<Query<DelegateSearchParams>, QueryRejection>,
) -> ApiResult<Vec<DelegateCandidate>> {
    let Query(params) = params?;
    let query = params.q.unwrap_or_default();
    let query = query.trim();
    if query.chars().count() < MIN_SEARCH_CHARS {
        return Ok(ApiResponse::ok(Vec::new()));
    }

    let mut candidates = state
        .repo
        .search_delegates(user.id, &contains_pattern(query), DELEGATE_SEARCH_LIMIT)
        .await?;
    // The query already excludes the caller and applies the limit; enforce both here too.
    candidates.retain(|candidate| candidate.id != user.id);
    candidates.truncate(DELEGATE_SEARCH_LIMIT as usize);

    Ok(ApiResponse::ok(candidates))
}

/// create_delegation
///
/// [Manager Route] Grants the caller's approval authority to another active user for
/// a date range.
#[utoipa::path(
    post,
    path = "/api/manager/delegates",
    request_body = CreateDelegationRequest,
    responses(
        (status = 200, description = "Created (enveloped)", body = Delegation),
        (status = 400, description = "Invalid delegate or dates"),
        (status = 404, description = "Delegate not found or inactive")
    )
)]
pub async fn create_delegation(
    Authorized { user, .. }: Authorized<Managers>,
    State(state): State<AppState>,
    payload: Result<Json<CreateDelegationRequest>, JsonRejection>,
) -> ApiResult<Delegation> {
    let Json(payload) = payload?;
    let (Some(delegate_id), Some(start), Some(end)) = (
        non_blank(payload.delegate_id),
        non_blank(payload.start_date),
        non_blank(payload.end_date),
    ) else {
        return Err(ApiError::BadRequest("missing_required_fields"));
    };

    let delegate_id =
        Uuid::parse_str(&delegate_id).map_err(|_| ApiError::BadRequest("invalid_user_id"))?;
    if delegate_id == user.id {
        return Err(ApiError::BadRequest("self_delegation"));
    }
    let start_date = parse_date(&start)?;
    let end_date = parse_date(&end)?;
    if start_date > end_date {
        return Err(ApiError::BadRequest("invalid_date_range"));
    }

    let delegation = state
        .repo
        .create_delegation(NewDelegation {
            manager_id: user.id,
            delegate_id,
            start_date,
            end_date,
        })
        .await?
        .ok_or(ApiError::NotFound)?;

    record_best_effort(
        &state.audit,
        NewAuditEntry::new(Some(user.id), AuditAction::DelegationCreated)
            .target("delegations", delegation.id)
            .values(serde_json::json!({
                "delegateId": delegation.delegate_id,
                "startDate": delegation.start_date,
                "endDate": delegation.end_date,
            })),
    )
    .await;

    Ok(ApiResponse::ok(delegation))
}

// --- Admin Handlers ---

/// update_setting
///
/// [Admin Route] Creates or overwrites a system setting.
#[utoipa::path(
    put,
    path = "/api/admin/settings/{key}",
    params(("key" = String, Path, description = "Setting key, e.g. AUTH_MODE")),
    request_body = UpdateSettingRequest,
    responses(
        (status = 200, description = "Stored (enveloped)", body = SystemSetting),
        (status = 400, description = "Empty key or value")
    )
)]
pub async fn update_setting(
    Authorized { user, .. }: Authorized<Administrators>,
    State(state): State<AppState>,
    Path(key): Path<String>,
    payload: Result<Json<UpdateSettingRequest>, JsonRejection>,
) -> ApiResult<SystemSetting> {
    let Json(payload) = payload?;
    let (Some(key), Some(value)) = (non_blank(Some(key)), non_blank(payload.value)) else {
        return Err(ApiError::BadRequest("missing_required_fields"));
    };

    let setting = state.repo.upsert_setting(&key, &value).await?;

    record_best_effort(
        &state.audit,
        NewAuditEntry::new(Some(user.id), AuditAction::SettingUpdated)
            .target("system_settings", &setting.key)
            .values(serde_json::json!({ "value": setting.value })),
    )
    .await;

    Ok(ApiResponse::ok(setting))
}

/// get_audit_logs
///
/// [Admin Route] Most recent audit entries.
#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    params(AuditLogParams),
    responses((status = 200, description = "Entries, newest first (enveloped)", body = [AuditLogEntry]))
)]
pub async fn get_audit_logs(
    _auth: Authorized<Administrators>,
    State(state): State<AppState>,
    params: Result<Query<AuditLogParams>, QueryRejection>,
) -> ApiResult<Vec<AuditLogEntry>> {
    let Query(params) = params?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    Ok(ApiResponse::ok(state.audit.recent(limit).await?))
}
