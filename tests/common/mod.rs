#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use leave_portal::{
    AppConfig, AppState,
    audit::{AuditState, MockAuditLog},
    auth::{self, AuthUser},
    db::DbError,
    models::{
        DelegateCandidate, Delegation, Role, SystemSetting, User, UserProfile, WorkingSaturday,
    },
    repository::{NewDelegation, NewWorkingSaturday, Repository, RepositoryState},
};
use std::{collections::HashMap, sync::Arc, sync::Mutex};
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// Canned data in, recorded calls out. Every trait method logs its name first so
// tests can assert that a rejected request never reached the store.
#[derive(Default)]
pub struct MockRepository {
    pub users: Vec<User>,
    pub settings: HashMap<String, String>,
    pub departments: Vec<String>,
    pub candidates: Vec<DelegateCandidate>,
    pub working_saturdays: Vec<WorkingSaturday>,
    pub active_delegate: bool,
    // Every method fails as if the pool could not be reached.
    pub unavailable: bool,
    // Only settings reads fail.
    pub settings_unavailable: bool,
    // Inserts report a unique violation.
    pub conflict_on_insert: bool,

    pub calls: Mutex<Vec<&'static str>>,
    pub last_search: Mutex<Option<(Uuid, String, i64)>>,
    pub password_updates: Mutex<Vec<(Uuid, String)>>,
    pub delegations: Mutex<Vec<NewDelegation>>,
}

impl MockRepository {
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than session resolution.
    pub fn data_calls(&self) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|name| *name != "get_user")
            .collect()
    }

    pub fn password_updates(&self) -> Vec<(Uuid, String)> {
        self.password_updates.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str) -> Result<(), DbError> {
        self.calls.lock().unwrap().push(name);
        if self.unavailable {
            return Err(DbError::Unavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn profile(user: &User) -> UserProfile {
        UserProfile {
            id: user.id,
            employee_id: user.employee_id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role,
            department: user.department.clone(),
            is_active: user.is_active,
            manager_id: user.manager_id,
            manager_name: None,
        }
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DbError> {
        self.record("get_user")?;
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_employee_id(&self, employee_id: &str) -> Result<Option<User>, DbError> {
        self.record("find_user_by_employee_id")?;
        Ok(self
            .users
            .iter()
            .find(|u| u.employee_id == employee_id)
            .cloned())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<UserProfile>, DbError> {
        self.record("get_profile")?;
        Ok(self.users.iter().find(|u| u.id == id).map(Self::profile))
    }

    async fn get_settings(&self, keys: &[&str]) -> Result<HashMap<String, String>, DbError> {
        self.record("get_settings")?;
        if self.settings_unavailable {
            return Err(DbError::Unavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(self
            .settings
            .iter()
            .filter(|(k, _)| keys.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<SystemSetting, DbError> {
        self.record("upsert_setting")?;
        Ok(SystemSetting {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: Utc::now(),
        })
    }

    async fn list_departments(&self) -> Result<Vec<String>, DbError> {
        self.record("list_departments")?;
        Ok(self.departments.clone())
    }

    async fn list_employees(&self, department: Option<String>) -> Result<Vec<UserProfile>, DbError> {
        self.record("list_employees")?;
        Ok(self
            .users
            .iter()
            .filter(|u| department.is_none() || u.department == department)
            .map(Self::profile)
            .collect())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool, DbError> {
        self.record("update_password")?;
        if !self.users.iter().any(|u| u.id == user_id) {
            return Ok(false);
        }
        self.password_updates
            .lock()
            .unwrap()
            .push((user_id, password_hash.to_string()));
        Ok(true)
    }

    async fn is_active_delegate(&self, _user_id: Uuid, _on: NaiveDate) -> Result<bool, DbError> {
        self.record("is_active_delegate")?;
        Ok(self.active_delegate)
    }

    // Returns the canned candidates unfiltered, so the handler's own guards are visible.
    async fn search_delegates(
        &self,
        exclude_id: Uuid,
        pattern: &str,
        limit: i64,
    ) -> Result<Vec<DelegateCandidate>, DbError> {
        self.record("search_delegates")?;
        *self.last_search.lock().unwrap() = Some((exclude_id, pattern.to_string(), limit));
        Ok(self.candidates.clone())
    }

    async fn create_delegation(&self, delegation: NewDelegation) -> Result<Option<Delegation>, DbError> {
        self.record("create_delegation")?;
        let delegate_ok = self
            .users
            .iter()
            .any(|u| u.id == delegation.delegate_id && u.is_active);
        if !delegate_ok {
            return Ok(None);
        }
        self.delegations.lock().unwrap().push(delegation.clone());
        Ok(Some(Delegation {
            id: Uuid::new_v4(),
            manager_id: delegation.manager_id,
            delegate_id: delegation.delegate_id,
            start_date: delegation.start_date,
            end_date: delegation.end_date,
            is_active: true,
        }))
    }

    async fn working_saturdays_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WorkingSaturday>, DbError> {
        self.record("working_saturdays_between")?;
        Ok(self
            .working_saturdays
            .iter()
            .filter(|d| d.work_date >= start && d.work_date <= end)
            .cloned()
            .collect())
    }

    async fn create_working_saturday(&self, day: NewWorkingSaturday) -> Result<WorkingSaturday, DbError> {
        self.record("create_working_saturday")?;
        if self.conflict_on_insert {
            return Err(DbError::Conflict(sqlx::Error::Protocol(
                "duplicate key value violates unique constraint".to_string(),
            )));
        }
        Ok(WorkingSaturday {
            id: Uuid::new_v4(),
            work_date: day.work_date,
            start_time: day.start_time,
            end_time: day.end_time,
            hours: day.hours,
            description: day.description,
        })
    }
}

// --- Fixtures ---

pub fn user(role: Role) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        employee_id: format!("EMP{}", &id.simple().to_string()[..6]),
        first_name: "Test".to_string(),
        last_name: format!("{role:?}"),
        email: Some(format!("{id}@leave.test")),
        password_hash: None,
        role,
        department: Some("Engineering".to_string()),
        is_active: true,
        manager_id: None,
    }
}

pub fn auth_user(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        role: user.role,
        employee_id: user.employee_id.clone(),
    }
}

pub fn candidate(id: Uuid, first_name: &str) -> DelegateCandidate {
    DelegateCandidate {
        id,
        employee_id: format!("EMP-{first_name}"),
        first_name: first_name.to_string(),
        last_name: "Candidate".to_string(),
        department: None,
    }
}

pub fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Test harness: the state plus typed handles on the mocks behind it.
pub struct TestContext {
    pub state: AppState,
    pub repo: Arc<MockRepository>,
    pub audit: Arc<MockAuditLog>,
}

impl TestContext {
    pub fn new(repo: MockRepository) -> Self {
        Self::with_audit(repo, MockAuditLog::new())
    }

    pub fn with_audit(repo: MockRepository, audit: MockAuditLog) -> Self {
        Self::with_config(repo, audit, AppConfig::default())
    }

    pub fn with_config(repo: MockRepository, audit: MockAuditLog, config: AppConfig) -> Self {
        let repo = Arc::new(repo);
        let audit = Arc::new(audit);
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            audit: audit.clone() as AuditState,
            config,
        };
        Self { state, repo, audit }
    }

    /// A signed session token for `user_id` under the test state's secret.
    pub fn token_for(&self, user_id: Uuid) -> String {
        auth::issue_token(user_id, &self.state.config.jwt_secret, 1)
            .unwrap()
            .0
    }
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
