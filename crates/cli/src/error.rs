use serde_json::json;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Warden(#[from] warden::Error),

	#[error(transparent)]
	Browser(#[from] warden_runtime::Error),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

fn browser_code(err: &warden_runtime::Error) -> ErrorCode {
	match err {
		warden_runtime::Error::Timeout { .. } => ErrorCode::Timeout,
		_ => ErrorCode::BrowserError,
	}
}

impl CliError {
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::Warden(err) => match err {
				warden::Error::LoginNotFound(_) => ErrorCode::LoginNotFound,
				warden::Error::AgentNotFound(_) => ErrorCode::AgentNotFound,
				warden::Error::LoginInUse { .. } => ErrorCode::LoginInUse,
				warden::Error::NeedsReconnect { .. } => ErrorCode::NeedsReconnect,
				warden::Error::InvalidLogins { .. } => ErrorCode::InvalidLogins,
				warden::Error::Decryption(_) => ErrorCode::DecryptionFailed,
				warden::Error::Script(_) => ErrorCode::InvalidScript,
				warden::Error::Browser(inner) => browser_code(inner),
				warden::Error::Config(_) => ErrorCode::ConfigError,
				warden::Error::Store(_) => ErrorCode::StoreError,
				warden::Error::Io(_) => ErrorCode::IoError,
				warden::Error::Json(_) | warden::Error::Encryption(_) => ErrorCode::InternalError,
			},
			CliError::Browser(err) => browser_code(err),
			CliError::InvalidInput(_) => ErrorCode::InvalidInput,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) => ErrorCode::InvalidInput,
		}
	}

	/// Structured details for refusals and referential failures.
	fn details(&self) -> Option<serde_json::Value> {
		match self {
			CliError::Warden(warden::Error::NeedsReconnect { logins } | warden::Error::InvalidLogins { logins }) => Some(json!({ "logins": logins })),
			CliError::Warden(warden::Error::LoginInUse { agents, .. }) => Some(json!({ "agents": agents })),
			_ => None,
		}
	}

	pub fn to_command_error(&self) -> CommandError {
		CommandError {
			code: self.code(),
			message: self.to_string(),
			details: self.details(),
		}
	}
}

#[cfg(test)]
mod tests {
	use warden_protocol::{AgentId, LoginId};

	use super::*;

	#[test]
	fn refusals_keep_their_login_names() {
		let err = CliError::from(warden::Error::NeedsReconnect {
			logins: vec!["mail".into(), "bank".into()],
		});
		let out = err.to_command_error();
		assert_eq!(out.code, ErrorCode::NeedsReconnect);
		assert_eq!(out.details, Some(json!({"logins": ["mail", "bank"]})));
		assert!(out.message.contains("mail, bank"));
	}

	#[test]
	fn lookup_and_browser_errors_map_to_codes() {
		assert_eq!(CliError::from(warden::Error::LoginNotFound(LoginId::from("x"))).code(), ErrorCode::LoginNotFound);
		assert_eq!(CliError::from(warden::Error::AgentNotFound(AgentId::from("x"))).code(), ErrorCode::AgentNotFound);
		assert_eq!(CliError::from(warden::Error::Config("missing key".into())).code(), ErrorCode::ConfigError);

		let timeout = warden_runtime::Error::Timeout {
			timeout_ms: 10,
			message: "waiting".into(),
		};
		assert_eq!(CliError::from(warden::Error::Browser(timeout)).code(), ErrorCode::Timeout);
		assert_eq!(CliError::InvalidInput("bad".into()).code(), ErrorCode::InvalidInput);
	}

	#[test]
	fn login_in_use_lists_agents() {
		let err = CliError::from(warden::Error::LoginInUse {
			login: LoginId::from("l1"),
			agents: vec!["exporter".into()],
		});
		let out = err.to_command_error();
		assert_eq!(out.code, ErrorCode::LoginInUse);
		assert_eq!(out.details, Some(json!({"agents": ["exporter"]})));
	}
}
