//! Login health validation.
//!
//! One check produces one authoritative [`HealthCheckResult`] and persists it:
//!
//! 1. a known-expired session is reported `DISCONNECTED` without touching a browser
//! 2. a stored session is replayed and probed; a definitive verdict ends the check
//! 3. otherwise the login script runs with decrypted credentials and the
//!    landing page is classified
//!
//! Failures inside a check become statuses. Only a missing login or a store
//! failure is returned as an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use warden_protocol::{HealthCheckResult, Login, LoginId, LoginStatus, LoginStatusUpdate};
use warden_runtime::{BrowserPool, DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_SELECTOR_TIMEOUT_MS, Page};

use crate::classify::{Landing, Rules, StatusOutcome};
use crate::config::DEFAULT_CHECK_DELAY_MS;
use crate::error::{Error, Result};
use crate::script::{Credentials, LoginScript, ScriptRunner, ScriptSource, default_two_factor_selectors};
use crate::session::{SessionManager, is_expired};
use crate::store::LoginStore;

pub const SESSION_EXPIRED: &str = "Session expired";

/// Tunables for health checks.
#[derive(Debug, Clone)]
pub struct CheckOptions {
	/// Pause between logins in [`LoginHealthChecker::check_all_logins`].
	pub check_delay: Duration,
	pub navigation_timeout_ms: u64,
	pub selector_timeout_ms: u64,
	/// Pause after submitting an auto-detected login form.
	pub settle_ms: u64,
}

impl Default for CheckOptions {
	fn default() -> Self {
		Self {
			check_delay: Duration::from_millis(DEFAULT_CHECK_DELAY_MS),
			navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
			selector_timeout_ms: DEFAULT_SELECTOR_TIMEOUT_MS,
			settle_ms: 2000,
		}
	}
}

/// Classified result of one check, before persistence.
#[derive(Debug, Clone, PartialEq)]
struct Evaluation {
	outcome: StatusOutcome,
	needs_reconnect: bool,
	path: &'static str,
}

impl Evaluation {
	fn reconnect(status: LoginStatus, message: impl Into<String>, path: &'static str) -> Self {
		Self {
			outcome: StatusOutcome::failed(status, message),
			needs_reconnect: true,
			path,
		}
	}

	fn classified(outcome: StatusOutcome, path: &'static str) -> Self {
		Self {
			outcome,
			needs_reconnect: false,
			path,
		}
	}
}

/// Runs health checks for stored logins.
pub struct LoginHealthChecker {
	store: Arc<dyn LoginStore>,
	pool: Arc<BrowserPool>,
	sessions: Arc<SessionManager>,
	rules: Arc<Rules>,
	options: CheckOptions,
}

impl LoginHealthChecker {
	pub fn new(store: Arc<dyn LoginStore>, pool: Arc<BrowserPool>, sessions: Arc<SessionManager>) -> Self {
		Self {
			store,
			pool,
			sessions,
			rules: Arc::new(Rules::default()),
			options: CheckOptions::default(),
		}
	}

	pub fn with_options(mut self, options: CheckOptions) -> Self {
		self.options = options;
		self
	}

	/// Replaces the classification rules used for credential logins.
	pub fn with_rules(mut self, rules: Arc<Rules>) -> Self {
		self.rules = rules;
		self
	}

	pub fn sessions(&self) -> &SessionManager {
		&self.sessions
	}

	/// Checks one login and persists the outcome.
	pub async fn check_login_health(&self, login_id: &LoginId) -> Result<HealthCheckResult> {
		let login = self
			.store
			.get_login(login_id)
			.await?
			.ok_or_else(|| Error::LoginNotFound(login_id.clone()))?;

		let started = Instant::now();
		let evaluation = self.evaluate(&login).await;
		let checked_at = Utc::now();
		let response_time_ms = started.elapsed().as_millis() as u64;

		info!(
			target = "warden.health",
			login = %login.id,
			path = evaluation.path,
			status = %evaluation.outcome.status,
			elapsed_ms = response_time_ms,
			"login checked"
		);

		self.update_login_status(login_id, &evaluation.outcome, checked_at).await?;

		Ok(HealthCheckResult {
			login_id: login_id.clone(),
			success: evaluation.outcome.is_success(),
			status: evaluation.outcome.status,
			error_message: evaluation.outcome.error_message,
			response_time_ms,
			last_checked: checked_at,
			needs_reconnect: evaluation.needs_reconnect.then_some(true),
		})
	}

	/// Checks every stored login, one at a time, pausing between checks.
	///
	/// A login whose check fails unexpectedly is recorded as `BROKEN` and the
	/// batch continues.
	pub async fn check_all_logins(&self) -> Result<Vec<HealthCheckResult>> {
		let logins = self.store.list_logins().await?;
		let mut results = Vec::with_capacity(logins.len());

		for (index, login) in logins.iter().enumerate() {
			if index > 0 && !self.options.check_delay.is_zero() {
				tokio::time::sleep(self.options.check_delay).await;
			}

			match self.check_login_health(&login.id).await {
				Ok(result) => results.push(result),
				Err(err) => {
					warn!(target = "warden.health", login = %login.id, error = %err, "health check failed");
					let outcome = StatusOutcome::failed(LoginStatus::Broken, err.to_string());
					let checked_at = Utc::now();
					if let Err(store_err) = self.update_login_status(&login.id, &outcome, checked_at).await {
						warn!(target = "warden.health", login = %login.id, error = %store_err, "could not record failure");
					}
					results.push(HealthCheckResult {
						login_id: login.id.clone(),
						success: false,
						status: LoginStatus::Broken,
						error_message: outcome.error_message,
						response_time_ms: 0,
						last_checked: checked_at,
						needs_reconnect: None,
					});
				}
			}
		}

		Ok(results)
	}

	/// Persists a check outcome.
	///
	/// Ready statuses count as success (`failure_count` reset to zero), every
	/// other status as a failure (`failure_count` incremented by one).
	pub async fn update_login_status(&self, login_id: &LoginId, outcome: &StatusOutcome, checked_at: DateTime<Utc>) -> Result<Login> {
		let update = LoginStatusUpdate {
			login_id: login_id.clone(),
			status: outcome.status,
			error_message: outcome.error_message.clone(),
			success: outcome.is_success(),
			checked_at,
		};
		let login = self.store.apply_status_update(&update).await?;
		debug!(
			target = "warden.health",
			login = %login_id,
			status = %login.status,
			failures = login.failure_count,
			"status persisted"
		);
		Ok(login)
	}

	async fn evaluate(&self, login: &Login) -> Evaluation {
		if is_expired(login.session_expiry, Utc::now()) {
			return Evaluation::reconnect(LoginStatus::Disconnected, SESSION_EXPIRED, "expired");
		}

		if let Some(session_data) = &login.session_data {
			let selectors = session_two_factor_selectors(login);
			match self.sessions.validate_session(&self.pool, session_data, probe_url(login), &selectors).await {
				Err(err) => return Evaluation::reconnect(LoginStatus::Disconnected, err.to_string(), "session"),
				Ok(verdict) if verdict.is_valid => {
					return Evaluation::classified(StatusOutcome::ok(LoginStatus::Active), "session");
				}
				Ok(verdict) if verdict.needs_reconnect => {
					let message = verdict.error_message.unwrap_or_else(|| "Session needs reconnect".into());
					return Evaluation::reconnect(LoginStatus::NeedsReconnect, message, "session");
				}
				Ok(_) => debug!(target = "warden.health", login = %login.id, "session probe inconclusive; trying credentials"),
			}
		}

		Evaluation::classified(self.credential_login(login).await, "credentials")
	}

	async fn credential_login(&self, login: &Login) -> StatusOutcome {
		let credentials = match self.credentials(login) {
			Ok(credentials) => credentials,
			Err(err) => return self.rules.classify_failure(&err.to_string()),
		};
		let source = match ScriptSource::resolve(login) {
			Ok(source) => source,
			Err(err) => return self.rules.classify_failure(&err.to_string()),
		};
		debug!(target = "warden.health", login = %login.id, script = %source.label(), "running login script");

		let lease = match self.pool.acquire().await {
			Ok(lease) => lease,
			Err(err) => return self.rules.classify_failure(&err.to_string()),
		};

		let runner = ScriptRunner::new(lease.page(), &credentials)
			.with_timeouts(self.options.navigation_timeout_ms, self.options.selector_timeout_ms)
			.with_settle_ms(self.options.settle_ms);

		let outcome = match self.run_and_observe(&runner, lease.page(), &source).await {
			Ok(landing) => {
				let decision = self.rules.landing.classify(&landing);
				debug!(
					target = "warden.health",
					login = %login.id,
					url = %landing.url,
					rule = decision.rule.unwrap_or("fallback"),
					"landing classified"
				);
				decision.outcome
			}
			Err(err) => self.rules.classify_failure(&err.to_string()),
		};

		lease.release().await;
		outcome
	}

	async fn run_and_observe(&self, runner: &ScriptRunner<'_>, page: &dyn Page, source: &ScriptSource) -> Result<Landing> {
		let script: Option<&LoginScript> = match source {
			ScriptSource::Template { script, .. } | ScriptSource::Custom(script) => {
				runner.run(script).await?;
				Some(script)
			}
			ScriptSource::AutoDetect => {
				runner.auto_detect().await?;
				None
			}
		};

		let url = page.current_url().await?;
		let title = page.title().await?;
		let two_factor = source.two_factor_selectors();
		let pattern_matches = |pattern: Option<&crate::script::UrlPattern>| pattern.is_some_and(|p| p.matches(&url));

		Ok(Landing {
			success_matched: pattern_matches(script.and_then(|s| s.success_url_pattern.as_ref())),
			error_matched: pattern_matches(script.and_then(|s| s.error_url_pattern.as_ref())),
			two_factor_present: runner.any_visible(&two_factor).await,
			title,
			url,
		})
	}

	fn credentials(&self, login: &Login) -> Result<Credentials> {
		let cipher = self.sessions.cipher();
		let decrypt = |value: &String| cipher.decrypt_str(value).map_err(Error::from);
		Ok(Credentials {
			username: decrypt(&login.username)?,
			password: login.password.as_ref().map(decrypt).transpose()?,
			oauth_token: login.oauth_token.as_ref().map(decrypt).transpose()?,
			site_url: login.site_url.clone(),
			login_url: login.login_url.clone(),
		})
	}
}

/// URL opened when probing a replayed session.
pub(crate) fn probe_url(login: &Login) -> &str {
	login.login_url.as_deref().unwrap_or(&login.site_url)
}

/// Two-factor selectors of the login's script; the defaults when it has none
/// or it does not load.
pub(crate) fn session_two_factor_selectors(login: &Login) -> Vec<String> {
	ScriptSource::resolve(login)
		.map(|source| source.two_factor_selectors())
		.unwrap_or_else(|_| default_two_factor_selectors())
}
