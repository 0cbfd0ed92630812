use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::{marker::PhantomData, sync::LazyLock};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::Role,
    repository::RepositoryState,
};

/// Name of the cookie that may carry the session token instead of the header.
pub const SESSION_COOKIE: &str = "leave_session";

/// Claims
///
/// Payload of a session token. Carries no role: that is re-read from the database on
/// every request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// issue_token
///
/// Signs a session token for `user_id` valid for `ttl_hours`.
pub fn issue_token(
    user_id: Uuid,
    secret: &str,
    ttl_hours: i64,
) -> Result<(String, DateTime<Utc>), ApiError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(ttl_hours);
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;

    Ok((token, expires_at))
}

/// hash_password
///
/// Produces an Argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// A real argon2 hash of a throwaway password, verified against when a login names no
/// usable account so that lookups cannot be told apart by response time.
pub fn dummy_hash() -> &'static str {
    static DUMMY: LazyLock<String> =
        LazyLock::new(|| hash_password("leave-portal-dummy").unwrap_or_default());
    DUMMY.as_str()
}

/// verify_password
///
/// Malformed stored hashes simply fail verification.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// AuthUser
///
/// The resolved principal of an authenticated request. Declaring it as a handler
/// argument is what makes a route session-gated.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub employee_id: String,
}

/// AuthUser Extractor Implementation
///
/// 1. Reuse a principal already resolved earlier in this request (middleware).
/// 2. Local bypass: in `Env::Local` an `x-user-id` header naming a real user is accepted.
/// 3. Token: `Authorization: Bearer <jwt>` or the `leave_session` cookie, with `exp` enforced.
/// 4. DB lookup: the user must still exist and be active.
///
/// Rejection: 401 when no valid session is present; 500 if the lookup itself fails.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            if let Some(user_id) = bypass_user_id(parts) {
                if let Some(user) = repo.get_user(user_id).await? {
                    if user.is_active {
                        let auth_user = AuthUser {
                            id: user.id,
                            role: user.role,
                            employee_id: user.employee_id,
                        };
                        parts.extensions.insert(auth_user.clone());
                        return Ok(auth_user);
                    }
                }
            }
        }
        // Production, or the bypass did not resolve: fall through to token validation.

        let token = session_token(parts).ok_or(ApiError::Unauthorized)?;

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            ApiError::Unauthorized
        })?;

        let user = repo
            .get_user(token_data.claims.sub)
            .await?
            .filter(|user| user.is_active)
            .ok_or(ApiError::Unauthorized)?;

        let auth_user = AuthUser {
            id: user.id,
            role: user.role,
            employee_id: user.employee_id,
        };
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}

fn bypass_user_id(parts: &Parts) -> Option<Uuid> {
    let raw = parts.headers.get("x-user-id")?.to_str().ok()?;
    Uuid::parse_str(raw).ok()
}

/// Bearer header first, then the session cookie.
fn session_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());
    if bearer.is_some() {
        return bearer;
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

// --- Role-Based Access Control ---

/// RolePolicy
///
/// A capability check over the closed `Role` set. Implementations must match every
/// variant explicitly so adding a role forces a decision at each policy.
pub trait RolePolicy: Send + Sync + 'static {
    fn permits(role: Role) -> bool;
}

/// HR staff and administrators.
#[derive(Debug, Clone, Copy)]
pub struct HrStaff;

impl RolePolicy for HrStaff {
    fn permits(role: Role) -> bool {
        match role {
            Role::Hr | Role::Admin => true,
            Role::Employee | Role::Manager => false,
        }
    }
}

/// Line managers.
#[derive(Debug, Clone, Copy)]
pub struct Managers;

impl RolePolicy for Managers {
    fn permits(role: Role) -> bool {
        match role {
            Role::Manager => true,
            Role::Employee | Role::Hr | Role::Admin => false,
        }
    }
}

/// System administrators.
#[derive(Debug, Clone, Copy)]
pub struct Administrators;

impl RolePolicy for Administrators {
    fn permits(role: Role) -> bool {
        match role {
            Role::Admin => true,
            Role::Employee | Role::Manager | Role::Hr => false,
        }
    }
}

/// Authorized
///
/// An `AuthUser` that has passed policy `P`. As an extractor it resolves the session
/// (401 on failure) and then applies the policy (403 on mismatch) before the handler
/// body runs.
#[derive(Debug, Clone)]
pub struct Authorized<P> {
    pub user: AuthUser,
    policy: PhantomData<fn() -> P>,
}

impl<P: RolePolicy> Authorized<P> {
    pub fn check(user: AuthUser) -> Result<Self, ApiError> {
        if P::permits(user.role) {
            Ok(Self {
                user,
                policy: PhantomData,
            })
        } else {
            tracing::debug!(user_id = %user.id, role = user.role.as_str(), "Role check failed");
            Err(ApiError::Forbidden)
        }
    }
}

impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
    P: RolePolicy,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Authorized::check(user)
    }
}

/// auth_middleware
///
/// Route layer for session-gated routers. Rejects with 401 before any handler runs and
/// leaves the resolved `AuthUser` in the request extensions for the handler to reuse.
pub async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// require_role
///
/// Route layer applying policy `P` to every route of a router.
pub async fn require_role<P: RolePolicy>(
    _authorized: Authorized<P>,
    request: Request,
    next: Next,
) -> Response {
    next.run(request).await
}
