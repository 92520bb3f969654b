//! Process configuration.
//!
//! Values come from built-in defaults, then an optional JSON file, then
//! `WARDEN_*` environment variables. Command-line flags are applied last by
//! the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_runtime::{DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_SELECTOR_TIMEOUT_MS};

use crate::crypto::Cipher;
use crate::error::{Error, Result};
use crate::health::CheckOptions;

pub const ENV_ENCRYPTION_KEY: &str = "WARDEN_ENCRYPTION_KEY";
pub const ENV_STORE: &str = "WARDEN_STORE";
pub const ENV_CDP_ENDPOINT: &str = "WARDEN_CDP_ENDPOINT";
pub const ENV_CHECK_DELAY_MS: &str = "WARDEN_CHECK_DELAY_MS";
pub const ENV_NAVIGATION_TIMEOUT_MS: &str = "WARDEN_NAVIGATION_TIMEOUT_MS";
pub const ENV_SELECTOR_TIMEOUT_MS: &str = "WARDEN_SELECTOR_TIMEOUT_MS";

pub const DEFAULT_CDP_ENDPOINT: &str = "http://127.0.0.1:9222";
pub const DEFAULT_CHECK_DELAY_MS: u64 = 2000;

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WardenConfig {
	pub store_path: PathBuf,
	pub cdp_endpoint: String,
	/// Process-wide secret. Never written back to disk.
	#[serde(skip_serializing)]
	pub encryption_key: Option<String>,
	pub check_delay_ms: u64,
	pub navigation_timeout_ms: u64,
	pub selector_timeout_ms: u64,
}

impl Default for WardenConfig {
	fn default() -> Self {
		Self {
			store_path: config_dir().join("store.json"),
			cdp_endpoint: DEFAULT_CDP_ENDPOINT.to_string(),
			encryption_key: None,
			check_delay_ms: DEFAULT_CHECK_DELAY_MS,
			navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
			selector_timeout_ms: DEFAULT_SELECTOR_TIMEOUT_MS,
		}
	}
}

/// `~/.config/warden` (or the platform equivalent).
pub fn config_dir() -> PathBuf {
	dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("warden")
}

impl WardenConfig {
	/// Defaults, then `path` (or `config.json` in [`config_dir`] if present), then the environment.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let mut config = match path {
			Some(path) => Self::from_file(path)?,
			None => {
				let default_path = config_dir().join("config.json");
				if default_path.exists() {
					Self::from_file(&default_path)?
				} else {
					Self::default()
				}
			}
		};
		config.overlay_env(|key| std::env::var(key).ok());
		Ok(config)
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)?;
		serde_json::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
	}

	/// Applies `WARDEN_*` variables read through `lookup`. Unparseable numbers are ignored.
	pub fn overlay_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
		let number = |key: &str| non_empty(key).and_then(|v| v.trim().parse::<u64>().ok());

		if let Some(key) = non_empty(ENV_ENCRYPTION_KEY) {
			self.encryption_key = Some(key);
		}
		if let Some(path) = non_empty(ENV_STORE) {
			self.store_path = PathBuf::from(path);
		}
		if let Some(endpoint) = non_empty(ENV_CDP_ENDPOINT) {
			self.cdp_endpoint = endpoint;
		}
		if let Some(ms) = number(ENV_CHECK_DELAY_MS) {
			self.check_delay_ms = ms;
		}
		if let Some(ms) = number(ENV_NAVIGATION_TIMEOUT_MS) {
			self.navigation_timeout_ms = ms;
		}
		if let Some(ms) = number(ENV_SELECTOR_TIMEOUT_MS) {
			self.selector_timeout_ms = ms;
		}
	}

	/// The cipher for the configured secret.
	pub fn cipher(&self) -> Result<Arc<Cipher>> {
		let secret = self
			.encryption_key
			.as_deref()
			.ok_or_else(|| Error::Config(format!("{ENV_ENCRYPTION_KEY} is not set")))?;
		Ok(Arc::new(Cipher::from_secret(secret)?))
	}

	pub fn check_options(&self) -> CheckOptions {
		CheckOptions {
			check_delay: Duration::from_millis(self.check_delay_ms),
			navigation_timeout_ms: self.navigation_timeout_ms,
			selector_timeout_ms: self.selector_timeout_ms,
			..CheckOptions::default()
		}
	}
}

impl std::fmt::Debug for WardenConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WardenConfig")
			.field("store_path", &self.store_path)
			.field("cdp_endpoint", &self.cdp_endpoint)
			.field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
			.field("check_delay_ms", &self.check_delay_ms)
			.field("navigation_timeout_ms", &self.navigation_timeout_ms)
			.field("selector_timeout_ms", &self.selector_timeout_ms)
			.finish()
	}
}
