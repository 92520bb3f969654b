//! Login health status enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted health state of a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginStatus {
	#[default]
	Unknown,
	Active,
	NeedsReconnect,
	Disconnected,
	Broken,
	Expired,
	Suspended,
	ReadyForAgents,
	NeedsTesting,
}

impl LoginStatus {
	pub const ALL: [LoginStatus; 9] = [
		LoginStatus::Unknown,
		LoginStatus::Active,
		LoginStatus::NeedsReconnect,
		LoginStatus::Disconnected,
		LoginStatus::Broken,
		LoginStatus::Expired,
		LoginStatus::Suspended,
		LoginStatus::ReadyForAgents,
		LoginStatus::NeedsTesting,
	];

	/// States from which an agent may run without user intervention.
	pub fn is_ready(self) -> bool {
		matches!(self, LoginStatus::Active | LoginStatus::ReadyForAgents)
	}

	/// States resolved by an interactive reconnect flow.
	pub fn needs_reconnect(self) -> bool {
		matches!(self, LoginStatus::NeedsReconnect | LoginStatus::Disconnected)
	}

	/// States resolved only by fixing the stored credentials.
	pub fn needs_credential_fix(self) -> bool {
		matches!(self, LoginStatus::Broken | LoginStatus::Expired | LoginStatus::Suspended)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			LoginStatus::Unknown => "UNKNOWN",
			LoginStatus::Active => "ACTIVE",
			LoginStatus::NeedsReconnect => "NEEDS_RECONNECT",
			LoginStatus::Disconnected => "DISCONNECTED",
			LoginStatus::Broken => "BROKEN",
			LoginStatus::Expired => "EXPIRED",
			LoginStatus::Suspended => "SUSPENDED",
			LoginStatus::ReadyForAgents => "READY_FOR_AGENTS",
			LoginStatus::NeedsTesting => "NEEDS_TESTING",
		}
	}
}

impl fmt::Display for LoginStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for LoginStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
		LoginStatus::ALL
			.into_iter()
			.find(|status| status.as_str() == normalized)
			.ok_or_else(|| format!("unknown login status: {s}"))
	}
}
