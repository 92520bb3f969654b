//! Agent login gate.
//!
//! Before an agent runs, every login it depends on is validated. Any login
//! that needs a reconnect refuses the run with [`Error::NeedsReconnect`]; any
//! other invalid login refuses it with [`Error::InvalidLogins`]. Refusals are
//! recorded in the run history and never retried.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use warden_protocol::{Agent, AgentId, AgentLoginStatus, AgentRun, Login, LoginStatus, LoginValidation, RunId, RunStatus};
use warden_runtime::BrowserPool;

use crate::error::{Error, Result};
use crate::executor::AgentExecutor;
use crate::health::{SESSION_EXPIRED, probe_url, session_two_factor_selectors};
use crate::session::{SessionManager, is_expired};
use crate::store::LoginStore;

/// Validates agent logins and runs agents that pass.
pub struct AgentRunner {
	store: Arc<dyn LoginStore>,
	pool: Arc<BrowserPool>,
	sessions: Arc<SessionManager>,
	executor: Arc<dyn AgentExecutor>,
}

impl AgentRunner {
	pub fn new(store: Arc<dyn LoginStore>, pool: Arc<BrowserPool>, sessions: Arc<SessionManager>, executor: Arc<dyn AgentExecutor>) -> Self {
		Self {
			store,
			pool,
			sessions,
			executor,
		}
	}

	async fn agent(&self, agent_id: &AgentId) -> Result<Agent> {
		self.store
			.get_agent(agent_id)
			.await?
			.ok_or_else(|| Error::AgentNotFound(agent_id.clone()))
	}

	/// One verdict per attached login, in attachment order.
	pub async fn validate_agent_logins(&self, agent_id: &AgentId) -> Result<Vec<LoginValidation>> {
		let logins = self.store.agent_logins(agent_id).await?;
		let mut validations = Vec::with_capacity(logins.len());
		for login in &logins {
			validations.push(self.validate_login(login).await);
		}
		Ok(validations)
	}

	async fn validate_login(&self, login: &Login) -> LoginValidation {
		let verdict = |is_valid: bool, needs_reconnect: bool, error_message: Option<String>| LoginValidation {
			is_valid,
			needs_reconnect,
			error_message,
			login_id: login.id.clone(),
			login_name: login.name.clone(),
		};

		if is_expired(login.session_expiry, Utc::now()) {
			return verdict(false, true, Some(SESSION_EXPIRED.to_string()));
		}
		if login.status.needs_reconnect() {
			let message = login.error_message.clone().unwrap_or_else(|| format!("Login is {}", login.status));
			return verdict(false, true, Some(message));
		}
		if login.status.needs_credential_fix() {
			return verdict(false, false, Some(format!("Login status is {}", login.status)));
		}
		if let (Some(session_data), LoginStatus::Active) = (&login.session_data, login.status) {
			let selectors = session_two_factor_selectors(login);
			return match self.sessions.validate_session(&self.pool, session_data, probe_url(login), &selectors).await {
				Ok(probe) => verdict(probe.is_valid, probe.needs_reconnect, probe.error_message),
				Err(err) => verdict(false, true, Some(err.to_string())),
			};
		}
		verdict(true, false, None)
	}

	/// Validates the agent's logins and, if all pass, runs its actions.
	///
	/// Refusals return an error and leave a `REFUSED` run behind. Executor
	/// failures are not errors: the returned run is `FAILED` with the cause.
	pub async fn execute_agent(&self, agent_id: &AgentId) -> Result<AgentRun> {
		let agent = self.agent(agent_id).await?;
		let validations = self.validate_agent_logins(agent_id).await?;
		let started_at = Utc::now();

		if let Some(refusal) = refusal(&validations) {
			warn!(target = "warden.agent", agent = %agent_id, error = %refusal, "agent run refused");
			self.store
				.record_run(AgentRun {
					id: new_run_id(),
					agent_id: agent_id.clone(),
					status: RunStatus::Refused,
					started_at,
					finished_at: Some(Utc::now()),
					error_message: Some(refusal.to_string()),
				})
				.await?;
			return Err(refusal);
		}

		let mut run = AgentRun {
			id: new_run_id(),
			agent_id: agent_id.clone(),
			status: RunStatus::Running,
			started_at,
			finished_at: None,
			error_message: None,
		};
		self.store.record_run(run.clone()).await?;

		let logins = self.store.agent_logins(agent_id).await?;
		let outcome = self.executor.execute(&agent, &logins).await;

		run.finished_at = Some(Utc::now());
		match outcome {
			Ok(()) => run.status = RunStatus::Succeeded,
			Err(err) => {
				run.status = RunStatus::Failed;
				run.error_message = Some(err.to_string());
			}
		}
		info!(target = "warden.agent", agent = %agent_id, run = %run.id, status = ?run.status, "agent run finished");
		self.store.record_run(run.clone()).await?;
		Ok(run)
	}

	/// Effective status of each attached login. Reads only.
	///
	/// A stored `ACTIVE` whose session has expired is shown as `DISCONNECTED`;
	/// the stored record is not changed.
	pub async fn get_agent_login_status(&self, agent_id: &AgentId) -> Result<Vec<AgentLoginStatus>> {
		let now = Utc::now();
		let logins = self.store.agent_logins(agent_id).await?;
		Ok(logins
			.into_iter()
			.map(|login| {
				let session_expired = is_expired(login.session_expiry, now);
				let status = if session_expired && login.status == LoginStatus::Active {
					LoginStatus::Disconnected
				} else {
					login.status
				};
				AgentLoginStatus {
					login_id: login.id,
					login_name: login.name,
					site_url: login.site_url,
					status,
					stored_status: login.status,
					session_expired,
					session_expiry: login.session_expiry,
					last_checked_at: login.last_checked_at,
					error_message: login.error_message,
					failure_count: login.failure_count,
				}
			})
			.collect())
	}

	pub async fn list_runs(&self, agent_id: &AgentId) -> Result<Vec<AgentRun>> {
		self.agent(agent_id).await?;
		self.store.list_runs(agent_id).await
	}
}

/// The refusal for `validations`, if any. Reconnects take precedence.
fn refusal(validations: &[LoginValidation]) -> Option<Error> {
	let names = |keep: fn(&LoginValidation) -> bool| -> Vec<String> {
		validations.iter().filter(|v| keep(v)).map(|v| v.login_name.clone()).collect()
	};

	let reconnect = names(|v| v.needs_reconnect);
	if !reconnect.is_empty() {
		return Some(Error::NeedsReconnect { logins: reconnect });
	}
	let invalid = names(|v| !v.is_valid);
	if !invalid.is_empty() {
		return Some(Error::InvalidLogins { logins: invalid });
	}
	None
}

fn new_run_id() -> RunId {
	RunId::from(Uuid::new_v4().to_string())
}
