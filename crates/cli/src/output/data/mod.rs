use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_protocol::{Login, LoginId, LoginStatus};

/// Login as shown to the user. Ciphertext fields are reduced to flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSummary {
	pub id: LoginId,
	pub name: String,
	pub site_url: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub login_url: Option<String>,
	pub status: LoginStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
	pub failure_count: u32,
	pub has_session: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_expiry: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_checked_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_success_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_failure_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub template_id: Option<String>,
	pub has_custom_script: bool,
}

impl From<&Login> for LoginSummary {
	fn from(login: &Login) -> Self {
		Self {
			id: login.id.clone(),
			name: login.name.clone(),
			site_url: login.site_url.clone(),
			login_url: login.login_url.clone(),
			status: login.status,
			error_message: login.error_message.clone(),
			failure_count: login.failure_count,
			has_session: login.session_data.is_some(),
			session_expiry: login.session_expiry,
			last_checked_at: login.last_checked_at,
			last_success_at: login.last_success_at,
			last_failure_at: login.last_failure_at,
			template_id: login.template_id.clone(),
			has_custom_script: login.custom_config.is_some(),
		}
	}
}

/// Result data for delete commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedData {
	pub deleted: String,
}
