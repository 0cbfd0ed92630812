use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::{Postgres, query_builder::QueryBuilder};
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::{
    db::{Database, DbError},
    models::{DelegateCandidate, Delegation, SystemSetting, User, UserProfile, WorkingSaturday},
};

/// NewWorkingSaturday
///
/// A validated calendar override ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkingSaturday {
    pub work_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub hours: f64,
    pub description: Option<String>,
}

/// NewDelegation
///
/// A validated delegation ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDelegation {
    pub manager_id: Uuid,
    pub delegate_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations the handlers need. Every
/// method is a single logical statement; failures surface as `DbError` so the HTTP
/// layer can answer 500 rather than silently returning empty data.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` usable across Axum's
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DbError>;
    async fn find_user_by_employee_id(&self, employee_id: &str) -> Result<Option<User>, DbError>;
    async fn get_profile(&self, id: Uuid) -> Result<Option<UserProfile>, DbError>;

    // --- Settings ---
    // Returns only the keys that exist.
    async fn get_settings(&self, keys: &[&str]) -> Result<HashMap<String, String>, DbError>;
    async fn upsert_setting(&self, key: &str, value: &str) -> Result<SystemSetting, DbError>;

    // --- HR ---
    async fn list_departments(&self) -> Result<Vec<String>, DbError>;
    async fn list_employees(&self, department: Option<String>) -> Result<Vec<UserProfile>, DbError>;
    // Returns false when no user has this id.
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool, DbError>;

    // --- Delegation ---
    async fn is_active_delegate(&self, user_id: Uuid, on: NaiveDate) -> Result<bool, DbError>;
    // `pattern` is an already-escaped ILIKE pattern.
    async fn search_delegates(
        &self,
        exclude_id: Uuid,
        pattern: &str,
        limit: i64,
    ) -> Result<Vec<DelegateCandidate>, DbError>;
    // Returns None when the delegate does not exist or is inactive.
    async fn create_delegation(&self, delegation: NewDelegation) -> Result<Option<Delegation>, DbError>;

    // --- Calendar ---
    async fn working_saturdays_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WorkingSaturday>, DbError>;
    async fn create_working_saturday(&self, day: NewWorkingSaturday) -> Result<WorkingSaturday, DbError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, employee_id, first_name, last_name, email, password_hash, \
                            role, department, is_active, manager_id";

const PROFILE_SELECT: &str = r#"
    SELECT u.id, u.employee_id, u.first_name, u.last_name, u.email, u.role,
           u.department, u.is_active, u.manager_id,
           m.first_name || ' ' || m.last_name AS manager_name
    FROM users u
    LEFT JOIN users m ON m.id = u.manager_id
"#;

/// PostgresRepository
///
/// The concrete implementation of `Repository`, backed by the shared `Database` gateway.
pub struct PostgresRepository {
    db: Arc<Database>,
}

impl PostgresRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.db
            .fetch_optional(sqlx::query_as::<_, User>(&sql).bind(id))
            .await
    }

    async fn find_user_by_employee_id(&self, employee_id: &str) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE employee_id = $1");
        self.db
            .fetch_optional(sqlx::query_as::<_, User>(&sql).bind(employee_id))
            .await
    }

    /// get_profile
    ///
    /// Joins the manager row so the profile page can show the manager's name.
    async fn get_profile(&self, id: Uuid) -> Result<Option<UserProfile>, DbError> {
        let sql = format!("{PROFILE_SELECT} WHERE u.id = $1");
        self.db
            .fetch_optional(sqlx::query_as::<_, UserProfile>(&sql).bind(id))
            .await
    }

    async fn get_settings(&self, keys: &[&str]) -> Result<HashMap<String, String>, DbError> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let rows = self
            .db
            .fetch_all(
                sqlx::query_as::<_, (String, String)>(
                    "SELECT key, value FROM system_settings WHERE key = ANY($1)",
                )
                .bind(keys),
            )
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<SystemSetting, DbError> {
        self.db
            .fetch_one(
                sqlx::query_as::<_, SystemSetting>(
                    r#"
                    INSERT INTO system_settings (key, value, updated_at)
                    VALUES ($1, $2, NOW())
                    ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                    RETURNING key, value, updated_at
                    "#,
                )
                .bind(key)
                .bind(value),
            )
            .await
    }

    async fn list_departments(&self) -> Result<Vec<String>, DbError> {
        let rows = self
            .db
            .fetch_all(sqlx::query_as::<_, (String,)>(
                "SELECT DISTINCT department FROM users \
                 WHERE department IS NOT NULL AND department <> '' ORDER BY department",
            ))
            .await?;
        Ok(rows.into_iter().map(|(department,)| department).collect())
    }

    /// list_employees
    ///
    /// Optional department filter appended with `QueryBuilder` so the value stays bound.
    async fn list_employees(&self, department: Option<String>) -> Result<Vec<UserProfile>, DbError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(PROFILE_SELECT);
        builder.push(" WHERE TRUE");
        if let Some(department) = department {
            builder.push(" AND u.department = ");
            builder.push_bind(department);
        }
        builder.push(" ORDER BY u.last_name, u.first_name");

        self.db.fetch_all(builder.build_query_as::<UserProfile>()).await
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool, DbError> {
        let affected = self
            .db
            .execute(
                sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                    .bind(user_id)
                    .bind(password_hash),
            )
            .await?;
        Ok(affected > 0)
    }

    async fn is_active_delegate(&self, user_id: Uuid, on: NaiveDate) -> Result<bool, DbError> {
        let (exists,) = self
            .db
            .fetch_one(
                sqlx::query_as::<_, (bool,)>(
                    r#"
                    SELECT EXISTS (
                        SELECT 1 FROM delegations
                        WHERE delegate_id = $1 AND is_active = TRUE
                          AND $2 BETWEEN start_date AND end_date
                    )
                    "#,
                )
                .bind(user_id)
                .bind(on),
            )
            .await?;
        Ok(exists)
    }

    /// search_delegates
    ///
    /// Active users other than the caller whose name or employee code matches. The
    /// pattern is bound once and reused by every predicate.
    async fn search_delegates(
        &self,
        exclude_id: Uuid,
        pattern: &str,
        limit: i64,
    ) -> Result<Vec<DelegateCandidate>, DbError> {
        self.db
            .fetch_all(
                sqlx::query_as::<_, DelegateCandidate>(
                    r#"
                    SELECT id, employee_id, first_name, last_name, department
                    FROM users
                    WHERE is_active = TRUE
                      AND id <> $1
                      AND (first_name ILIKE $2
                           OR last_name ILIKE $2
                           OR first_name || ' ' || last_name ILIKE $2
                           OR employee_id ILIKE $2)
                    ORDER BY last_name, first_name
                    LIMIT $3
                    "#,
                )
                .bind(exclude_id)
                .bind(pattern)
                .bind(limit),
            )
            .await
    }

    /// create_delegation
    ///
    /// Inserts only when the delegate is an active user, in one statement.
    async fn create_delegation(&self, delegation: NewDelegation) -> Result<Option<Delegation>, DbError> {
        self.db
            .fetch_optional(
                sqlx::query_as::<_, Delegation>(
                    r#"
                    INSERT INTO delegations (id, manager_id, delegate_id, start_date, end_date, is_active)
                    SELECT $1, $2, $3, $4, $5, TRUE
                    WHERE EXISTS (SELECT 1 FROM users WHERE id = $3 AND is_active = TRUE)
                    RETURNING id, manager_id, delegate_id, start_date, end_date, is_active
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(delegation.manager_id)
                .bind(delegation.delegate_id)
                .bind(delegation.start_date)
                .bind(delegation.end_date),
            )
            .await
    }

    async fn working_saturdays_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WorkingSaturday>, DbError> {
        self.db
            .fetch_all(
                sqlx::query_as::<_, WorkingSaturday>(
                    r#"
                    SELECT id, work_date, start_time, end_time, hours, description
                    FROM working_saturdays
                    WHERE work_date BETWEEN $1 AND $2
                    ORDER BY work_date
                    "#,
                )
                .bind(start)
                .bind(end),
            )
            .await
    }

    async fn create_working_saturday(&self, day: NewWorkingSaturday) -> Result<WorkingSaturday, DbError> {
        self.db
            .fetch_one(
                sqlx::query_as::<_, WorkingSaturday>(
                    r#"
                    INSERT INTO working_saturdays (id, work_date, start_time, end_time, hours, description)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING id, work_date, start_time, end_time, hours, description
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(day.work_date)
                .bind(day.start_time)
                .bind(day.end_time)
                .bind(day.hours)
                .bind(day.description),
            )
            .await
    }
}
