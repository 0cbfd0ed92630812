//! Typed projections over the `system_settings` key/value rows.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;
use utoipa::ToSchema;

pub const AUTH_MODE_KEY: &str = "AUTH_MODE";
pub const LEAVE_ADVANCE_DAYS_KEY: &str = "LEAVE_ADVANCE_DAYS";
pub const SICK_LEAVE_CERTIFICATE_DAYS_KEY: &str = "SICK_LEAVE_CERTIFICATE_DAYS";

/// Fallback for every leave-rule threshold. Consumers must read this constant instead
/// of repeating the number.
pub const DEFAULT_LEAVE_RULE_DAYS: i32 = 3;

/// AuthMode
///
/// Which login methods the portal offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum AuthMode {
    #[default]
    Local,
    Ldap,
    Azure,
    Hybrid,
}

impl AuthMode {
    /// Case-insensitive parse of a stored setting value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Some(AuthMode::Local),
            "LDAP" => Some(AuthMode::Ldap),
            "AZURE" => Some(AuthMode::Azure),
            "HYBRID" => Some(AuthMode::Hybrid),
            _ => None,
        }
    }

    pub fn allows_microsoft(self) -> bool {
        matches!(self, AuthMode::Azure | AuthMode::Hybrid)
    }

    pub fn allows_credentials(self) -> bool {
        matches!(self, AuthMode::Local | AuthMode::Ldap | AuthMode::Hybrid)
    }

    /// Whether credentials are checked against the local password hash. LDAP binds are
    /// handled by the directory integration, outside this service.
    pub fn allows_local_login(self) -> bool {
        matches!(self, AuthMode::Local | AuthMode::Hybrid)
    }
}

/// AuthModeFlags
///
/// UI capability flags derived from the configured auth mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthModeFlags {
    pub auth_mode: AuthMode,
    pub show_microsoft_button: bool,
    pub show_credentials_form: bool,
}

impl AuthModeFlags {
    pub fn for_mode(mode: AuthMode) -> Self {
        Self {
            auth_mode: mode,
            show_microsoft_button: mode.allows_microsoft(),
            show_credentials_form: mode.allows_credentials(),
        }
    }

    /// Served whenever the setting cannot be read or understood.
    pub fn fallback() -> Self {
        Self::for_mode(AuthMode::Local)
    }

    /// Missing rows and unknown values both resolve to the fallback.
    pub fn from_settings(settings: &HashMap<String, String>) -> Self {
        settings
            .get(AUTH_MODE_KEY)
            .and_then(|raw| AuthMode::parse(raw))
            .map(Self::for_mode)
            .unwrap_or_else(Self::fallback)
    }
}

/// LeaveRules
///
/// Leave-policy thresholds in days. No upper bound is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LeaveRules {
    /// Minimum days of notice before annual leave starts.
    pub advance_notice_days: i32,
    /// Consecutive sick days after which a medical certificate is required.
    pub sick_leave_certificate_days: i32,
}

impl Default for LeaveRules {
    fn default() -> Self {
        Self {
            advance_notice_days: DEFAULT_LEAVE_RULE_DAYS,
            sick_leave_certificate_days: DEFAULT_LEAVE_RULE_DAYS,
        }
    }
}

impl LeaveRules {
    pub const KEYS: [&'static str; 2] = [LEAVE_ADVANCE_DAYS_KEY, SICK_LEAVE_CERTIFICATE_DAYS_KEY];

    /// Missing or unparsable rows keep the `Default` value for that threshold.
    pub fn from_settings(settings: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            advance_notice_days: parse_days(settings.get(LEAVE_ADVANCE_DAYS_KEY))
                .unwrap_or(defaults.advance_notice_days),
            sick_leave_certificate_days: parse_days(settings.get(SICK_LEAVE_CERTIFICATE_DAYS_KEY))
                .unwrap_or(defaults.sick_leave_certificate_days),
        }
    }
}

fn parse_days(raw: Option<&String>) -> Option<i32> {
    raw.and_then(|value| value.trim().parse::<i32>().ok())
}
