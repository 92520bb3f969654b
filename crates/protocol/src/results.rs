//! Result objects returned by health checks, probes and the agent gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LoginId;
use crate::status::LoginStatus;

/// Verdict of replaying a session against a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeVerdict {
	pub is_valid: bool,
	pub needs_reconnect: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
}

impl ProbeVerdict {
	pub fn valid() -> Self {
		Self {
			is_valid: true,
			needs_reconnect: false,
			error_message: None,
		}
	}

	pub fn reconnect(message: impl Into<String>) -> Self {
		Self {
			is_valid: false,
			needs_reconnect: true,
			error_message: Some(message.into()),
		}
	}
}

/// Authoritative outcome of one login health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
	pub login_id: LoginId,
	pub success: bool,
	pub status: LoginStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
	pub response_time_ms: u64,
	pub last_checked: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub needs_reconnect: Option<bool>,
}

impl HealthCheckResult {
	pub fn needs_reconnect(&self) -> bool {
		self.needs_reconnect.unwrap_or(false)
	}
}

/// Per-login verdict produced by the agent login gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginValidation {
	pub is_valid: bool,
	pub needs_reconnect: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
	pub login_id: LoginId,
	pub login_name: String,
}

/// Read-only status row for one login attached to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentLoginStatus {
	pub login_id: LoginId,
	pub login_name: String,
	pub site_url: String,
	/// Status after applying the session-expiry override.
	pub status: LoginStatus,
	pub stored_status: LoginStatus,
	pub session_expired: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_expiry: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_checked_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
	pub failure_count: u32,
}
