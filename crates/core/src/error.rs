use thiserror::Error;
use warden_protocol::{AgentId, LoginId};

use crate::crypto::DecryptionError;
use crate::script::ScriptError;

/// Errors surfaced by the warden policy layer.
///
/// Health checks and gate validation convert per-login failures into result
/// objects; these variants reach callers only for lookups, persistence,
/// configuration and refused agent runs.
#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Decryption(#[from] DecryptionError),

	#[error("Encryption failed: {0}")]
	Encryption(String),

	#[error(transparent)]
	Script(#[from] ScriptError),

	#[error(transparent)]
	Browser(#[from] warden_runtime::Error),

	#[error("Store error: {0}")]
	Store(String),

	#[error("Login not found: {0}")]
	LoginNotFound(LoginId),

	#[error("Agent not found: {0}")]
	AgentNotFound(AgentId),

	#[error("Login {login} is still used by agents: {}", .agents.join(", "))]
	LoginInUse { login: LoginId, agents: Vec<String> },

	#[error("Logins need to be reconnected before this agent can run: {}", .logins.join(", "))]
	NeedsReconnect { logins: Vec<String> },

	#[error("Logins are not valid for this agent: {}", .logins.join(", "))]
	InvalidLogins { logins: Vec<String> },

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Refusals that require the user to reconnect or fix credentials.
	pub fn is_precondition_failure(&self) -> bool {
		matches!(self, Error::NeedsReconnect { .. } | Error::InvalidLogins { .. })
	}
}

pub type Result<T> = std::result::Result<T, Error>;
