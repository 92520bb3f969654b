//! Stored login, agent and run records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, LoginId, RunId};
use crate::status::LoginStatus;

/// One set of credentials for one external site.
///
/// `username`, `password`, `oauth_token` and `session_data` hold ciphertext;
/// they are never decrypted outside the health validator and the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
	pub id: LoginId,
	pub user_id: String,
	pub name: String,
	pub site_url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub login_url: Option<String>,
	pub username: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub password: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub oauth_token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_data: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_expiry: Option<DateTime<Utc>>,
	#[serde(default)]
	pub status: LoginStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_checked_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_success_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_failure_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub failure_count: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub template_id: Option<String>,
	/// User-defined login script, decoded and validated by the script loader.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub custom_config: Option<serde_json::Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Fields written by a single health check.
///
/// `success` selects between the success and failure bookkeeping rules; the
/// store applies them atomically per record.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginStatusUpdate {
	pub login_id: LoginId,
	pub status: LoginStatus,
	pub error_message: Option<String>,
	pub success: bool,
	pub checked_at: DateTime<Utc>,
}

impl LoginStatusUpdate {
	/// Applies the update to `login` in place.
	///
	/// `failure_count` resets to zero on success and increments by exactly one
	/// on failure; no other path touches it.
	pub fn apply_to(&self, login: &mut Login) {
		login.status = self.status;
		login.error_message = self.error_message.clone();
		login.last_checked_at = Some(self.checked_at);
		login.updated_at = self.checked_at;
		if self.success {
			login.last_success_at = Some(self.checked_at);
			login.failure_count = 0;
		} else {
			login.last_failure_at = Some(self.checked_at);
			login.failure_count = login.failure_count.saturating_add(1);
		}
	}
}

/// One step of an agent's scripted workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentAction {
	Goto {
		url: String,
	},
	Click {
		selector: String,
	},
	Type {
		selector: String,
		text: String,
	},
	#[serde(rename_all = "camelCase")]
	WaitForSelector {
		selector: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		timeout_ms: Option<u64>,
	},
	Download {
		selector: String,
	},
}

impl AgentAction {
	pub fn kind(&self) -> &'static str {
		match self {
			AgentAction::Goto { .. } => "goto",
			AgentAction::Click { .. } => "click",
			AgentAction::Type { .. } => "type",
			AgentAction::WaitForSelector { .. } => "waitForSelector",
			AgentAction::Download { .. } => "download",
		}
	}
}

/// A scripted automation that depends on zero or more logins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
	pub id: AgentId,
	pub user_id: String,
	pub name: String,
	/// Attached logins in attachment order.
	#[serde(default)]
	pub logins: Vec<LoginId>,
	#[serde(default)]
	pub actions: Vec<AgentAction>,
	pub created_at: DateTime<Utc>,
}

/// Outcome class of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
	Running,
	Succeeded,
	Failed,
	/// The login gate refused to start the run.
	Refused,
}

/// History entry for one attempted agent execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRun {
	pub id: RunId,
	pub agent_id: AgentId,
	pub status: RunStatus,
	pub started_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub finished_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn login() -> Login {
		let now = Utc::now();
		Login {
			id: "l1".into(),
			user_id: "u1".into(),
			name: "Example".into(),
			site_url: "https://example.com".into(),
			login_url: None,
			username: "enc".into(),
			password: None,
			oauth_token: None,
			session_data: None,
			session_expiry: None,
			status: LoginStatus::Unknown,
			last_checked_at: None,
			last_success_at: None,
			last_failure_at: None,
			failure_count: 0,
			error_message: None,
			template_id: None,
			custom_config: None,
			created_at: now,
			updated_at: now,
		}
	}

	fn update(success: bool) -> LoginStatusUpdate {
		LoginStatusUpdate {
			login_id: "l1".into(),
			status: if success { LoginStatus::Active } else { LoginStatus::Broken },
			error_message: (!success).then(|| "boom".to_string()),
			success,
			checked_at: Utc::now(),
		}
	}

	#[test]
	fn failures_accumulate_and_success_resets() {
		let mut login = login();
		for n in 1..=4 {
			update(false).apply_to(&mut login);
			assert_eq!(login.failure_count, n);
		}
		assert!(login.last_failure_at.is_some());
		assert!(login.last_success_at.is_none());

		update(true).apply_to(&mut login);
		assert_eq!(login.failure_count, 0);
		assert_eq!(login.status, LoginStatus::Active);
		assert_eq!(login.error_message, None);
		assert!(login.last_success_at.is_some());
	}

	#[test]
	fn agent_actions_are_tagged_by_type() {
		let json = r##"[
  {"type": "goto", "url": "https://example.com/reports"},
  {"type": "type", "selector": "#q", "text": "{{login.username}}"},
  {"type": "waitForSelector", "selector": ".done", "timeoutMs": 5000},
  {"type": "download", "selector": "a.csv"}
]"##;
		let actions: Vec<AgentAction> = serde_json::from_str(json).unwrap();
		assert_eq!(actions.len(), 4);
		assert_eq!(actions[2], AgentAction::WaitForSelector {
			selector: ".done".into(),
			timeout_ms: Some(5000)
		});
		assert_eq!(actions[3].kind(), "download");
	}
}
