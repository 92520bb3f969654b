use serde::{Deserialize, Serialize};

/// The result envelope printed by every command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub diagnostics: Vec<Diagnostic>,
}

/// Error information for failed commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Stable error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	LoginNotFound,
	AgentNotFound,
	LoginInUse,
	NeedsReconnect,
	InvalidLogins,
	DecryptionFailed,
	InvalidScript,
	BrowserError,
	Timeout,
	ConfigError,
	StoreError,
	InvalidInput,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			ErrorCode::LoginNotFound => "LOGIN_NOT_FOUND",
			ErrorCode::AgentNotFound => "AGENT_NOT_FOUND",
			ErrorCode::LoginInUse => "LOGIN_IN_USE",
			ErrorCode::NeedsReconnect => "NEEDS_RECONNECT",
			ErrorCode::InvalidLogins => "INVALID_LOGINS",
			ErrorCode::DecryptionFailed => "DECRYPTION_FAILED",
			ErrorCode::InvalidScript => "INVALID_SCRIPT",
			ErrorCode::BrowserError => "BROWSER_ERROR",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::StoreError => "STORE_ERROR",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(name)
	}
}

/// Diagnostic message attached to a command result.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
	pub level: DiagnosticLevel,
	pub message: String,
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
	Info,
	Warning,
}
