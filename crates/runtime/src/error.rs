use thiserror::Error;

/// Errors reported by browser drivers.
#[derive(Debug, Error)]
pub enum Error {
	#[error("Browser launch failed: {0}")]
	Launch(String),

	#[error("Navigation to {url} failed: {message}")]
	Navigation { url: String, message: String },

	#[error("Timeout {timeout_ms}ms exceeded: {message}")]
	Timeout { timeout_ms: u64, message: String },

	#[error("No element matches selector: {0}")]
	SelectorNotFound(String),

	#[error("Script evaluation failed: {0}")]
	Evaluation(String),

	#[error("Protocol error: {0}")]
	Protocol(String),

	#[error("Browser connection closed")]
	Closed,

	#[error("Unsupported operation: {0}")]
	Unsupported(String),
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Protocol(format!("JSON error: {err}"))
	}
}

pub type Result<T> = std::result::Result<T, Error>;
