use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use warden::{AgentRunner, Catalog, FileStore, LoginHealthChecker, LoginStore, ScriptedAgentExecutor, SessionManager, WardenConfig};
use warden_runtime::cdp::CdpLauncher;
use warden_runtime::{BrowserLauncher, BrowserPool};

use crate::cli::Cli;
use crate::error::Result;
use crate::output::OutputFormat;

/// Everything a command needs, built once per invocation.
pub struct CommandContext {
	pub config: WardenConfig,
	pub format: OutputFormat,
	pub store: Arc<dyn LoginStore>,
	pub pool: Arc<BrowserPool>,
	pub sessions: Arc<SessionManager>,
	started: Instant,
}

impl CommandContext {
	/// Loads configuration, applies command-line overrides and opens the file store.
	pub fn from_cli(cli: &Cli) -> Result<Self> {
		let mut config = WardenConfig::load(cli.config.as_deref())?;
		if let Some(store) = &cli.store {
			config.store_path = store.clone();
		}
		if let Some(endpoint) = &cli.cdp_endpoint {
			config.cdp_endpoint = endpoint.clone();
		}
		debug!(target = "warden", ?config, "resolved configuration");

		let store = Arc::new(FileStore::open(config.store_path.clone())?);
		let launcher = Arc::new(CdpLauncher::new(config.cdp_endpoint.clone()));
		Self::with_parts(config, cli.format, store, launcher)
	}

	/// Builds a context over an explicit store and browser launcher.
	pub fn with_parts(config: WardenConfig, format: OutputFormat, store: Arc<dyn LoginStore>, launcher: Arc<dyn BrowserLauncher>) -> Result<Self> {
		let sessions = Arc::new(SessionManager::new(config.cipher()?).with_navigation_timeout(config.navigation_timeout_ms));
		Ok(Self {
			pool: Arc::new(BrowserPool::new(launcher)),
			config,
			format,
			store,
			sessions,
			started: Instant::now(),
		})
	}

	pub fn catalog(&self) -> Catalog {
		Catalog::new(Arc::clone(&self.store), Arc::clone(&self.sessions))
	}

	pub fn checker(&self) -> LoginHealthChecker {
		LoginHealthChecker::new(Arc::clone(&self.store), Arc::clone(&self.pool), Arc::clone(&self.sessions)).with_options(self.config.check_options())
	}

	pub fn runner(&self) -> AgentRunner {
		let executor = ScriptedAgentExecutor::new(Arc::clone(&self.pool), Arc::clone(&self.sessions))
			.with_timeouts(self.config.navigation_timeout_ms, self.config.selector_timeout_ms);
		AgentRunner::new(Arc::clone(&self.store), Arc::clone(&self.pool), Arc::clone(&self.sessions), Arc::new(executor))
	}

	pub fn elapsed_ms(&self) -> u64 {
		self.started.elapsed().as_millis() as u64
	}

	/// Closes the browser connection if a command opened one.
	pub async fn shutdown(&self) {
		if let Err(err) = self.pool.shutdown().await {
			debug!(target = "warden.browser", error = %err, "browser shutdown failed");
		}
	}
}
