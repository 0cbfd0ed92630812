use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    db::{Database, DbError},
    models::AuditLogEntry,
};

/// AuditAction
///
/// Security-relevant actions recorded in `audit_logs`. Stored as their
/// SCREAMING_SNAKE_CASE name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Login,
    Logout,
    LoginFailed,
    PasswordReset,
    SettingUpdated,
    DelegationCreated,
    WorkingSaturdayCreated,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::PasswordReset => "PASSWORD_RESET",
            AuditAction::SettingUpdated => "SETTING_UPDATED",
            AuditAction::DelegationCreated => "DELEGATION_CREATED",
            AuditAction::WorkingSaturdayCreated => "WORKING_SATURDAY_CREATED",
        }
    }
}

/// NewAuditEntry
///
/// An entry waiting to be appended. Entries are immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub new_values: Option<serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(user_id: Option<Uuid>, action: AuditAction) -> Self {
        Self {
            user_id,
            action,
            table_name: None,
            record_id: None,
            new_values: None,
        }
    }

    pub fn target(mut self, table: &str, record_id: impl ToString) -> Self {
        self.table_name = Some(table.to_string());
        self.record_id = Some(record_id.to_string());
        self
    }

    pub fn values(mut self, values: serde_json::Value) -> Self {
        self.new_values = Some(values);
        self
    }
}

/// AuditLogger
///
/// Append-only sink for security events. Kept behind a trait so handlers can be tested
/// against `MockAuditLog` without a database.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record(&self, entry: NewAuditEntry) -> Result<(), DbError>;

    /// Most recent entries first.
    async fn recent(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DbError>;
}

/// Records a side-effect audit entry after the main operation has already succeeded.
/// A failed write is logged and does not fail the request.
pub async fn record_best_effort(audit: &AuditState, entry: NewAuditEntry) {
    let action = entry.action;
    if let Err(e) = audit.record(entry).await {
        tracing::warn!(action = action.as_str(), error = %e, "Failed to write audit entry");
    }
}

/// PostgresAuditLog
///
/// Writes to the `audit_logs` table through the shared gateway.
pub struct PostgresAuditLog {
    db: Arc<Database>,
}

impl PostgresAuditLog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditLogger for PostgresAuditLog {
    async fn record(&self, entry: NewAuditEntry) -> Result<(), DbError> {
        self.db
            .execute(
                sqlx::query(
                    "INSERT INTO audit_logs (user_id, action, table_name, record_id, new_values) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(entry.user_id)
                .bind(entry.action.as_str())
                .bind(entry.table_name)
                .bind(entry.record_id)
                .bind(entry.new_values),
            )
            .await?;
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DbError> {
        self.db
            .fetch_all(
                sqlx::query_as::<_, AuditLogEntry>(
                    "SELECT id, user_id, action, table_name, record_id, new_values, created_at \
                     FROM audit_logs ORDER BY created_at DESC, id DESC LIMIT $1",
                )
                .bind(limit),
            )
            .await
    }
}

/// MockAuditLog
///
/// In-memory implementation used by unit and integration tests.
#[derive(Default)]
pub struct MockAuditLog {
    entries: Mutex<Vec<NewAuditEntry>>,
    /// When true, every write fails as if the store were down.
    pub should_fail: bool,
}

impl MockAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<NewAuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditLogger for MockAuditLog {
    async fn record(&self, entry: NewAuditEntry) -> Result<(), DbError> {
        if self.should_fail {
            return Err(DbError::Internal("mock audit failure".to_string()));
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<AuditLogEntry>, DbError> {
        let entries = self.entries();
        Ok(entries
            .into_iter()
            .rev()
            .take(limit.max(0) as usize)
            .enumerate()
            .map(|(i, e)| AuditLogEntry {
                id: i as i64 + 1,
                user_id: e.user_id,
                action: e.action.as_str().to_string(),
                table_name: e.table_name,
                record_id: e.record_id,
                new_values: e.new_values,
                created_at: chrono::Utc::now(),
            })
            .collect())
    }
}

/// AuditState
///
/// The concrete type used to share the audit sink across the application state.
pub type AuditState = Arc<dyn AuditLogger>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_use_stored_names() {
        assert_eq!(AuditAction::PasswordReset.as_str(), "PASSWORD_RESET");
        assert_eq!(
            serde_json::to_value(AuditAction::LoginFailed).unwrap(),
            serde_json::json!("LOGIN_FAILED")
        );
    }

    #[tokio::test]
    async fn best_effort_swallows_failures() {
        let audit: AuditState = Arc::new(MockAuditLog::new_failing());
        record_best_effort(&audit, NewAuditEntry::new(None, AuditAction::Logout)).await;
    }

    #[tokio::test]
    async fn mock_returns_newest_first() {
        let audit = MockAuditLog::new();
        audit.record(NewAuditEntry::new(None, AuditAction::Login)).await.unwrap();
        audit.record(NewAuditEntry::new(None, AuditAction::Logout)).await.unwrap();

        let recent = audit.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].action, "LOGOUT");
    }
}
