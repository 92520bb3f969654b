//! Agent script execution behind the login gate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use warden_protocol::{Agent, AgentAction, Login};
use warden_runtime::{BrowserPool, DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_SELECTOR_TIMEOUT_MS, Page};

use crate::error::{Error, Result};
use crate::script::{ScriptError, render};
use crate::session::SessionManager;

/// Runs an agent's actions once the gate has accepted every login.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
	/// `logins` are the agent's attached logins in attachment order.
	async fn execute(&self, agent: &Agent, logins: &[Login]) -> Result<()>;
}

/// Decrypted username/password of one attached login.
struct LoginSecrets {
	username: String,
	password: Option<String>,
}

/// Executes [`AgentAction`]s in one leased browser context.
///
/// Stored sessions of every attached login are replayed into the context
/// first, so actions run signed in. Action values may reference
/// `{{login.username}}` and `{{login.password}}` (first attached login) or
/// `{{login.N.username}}` for the N-th login, counting from zero.
pub struct ScriptedAgentExecutor {
	pool: Arc<BrowserPool>,
	sessions: Arc<SessionManager>,
	navigation_timeout_ms: u64,
	selector_timeout_ms: u64,
}

impl ScriptedAgentExecutor {
	pub fn new(pool: Arc<BrowserPool>, sessions: Arc<SessionManager>) -> Self {
		Self {
			pool,
			sessions,
			navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
			selector_timeout_ms: DEFAULT_SELECTOR_TIMEOUT_MS,
		}
	}

	pub fn with_timeouts(mut self, navigation_timeout_ms: u64, selector_timeout_ms: u64) -> Self {
		self.navigation_timeout_ms = navigation_timeout_ms;
		self.selector_timeout_ms = selector_timeout_ms;
		self
	}

	fn secrets(&self, logins: &[Login]) -> Result<Vec<LoginSecrets>> {
		let cipher = self.sessions.cipher();
		logins
			.iter()
			.map(|login| -> Result<LoginSecrets> {
				Ok(LoginSecrets {
					username: cipher.decrypt_str(&login.username)?,
					password: login.password.as_deref().map(|p| cipher.decrypt_str(p)).transpose()?,
				})
			})
			.collect()
	}

	async fn run_actions(&self, agent: &Agent, logins: &[Login], page: &dyn Page) -> Result<()> {
		let secrets = self.secrets(logins)?;
		for (index, action) in agent.actions.iter().enumerate() {
			debug!(target = "warden.agent", agent = %agent.id, index, kind = action.kind(), "action");
			self.run_action(action, &secrets, page).await?;
		}
		Ok(())
	}

	async fn run_action(&self, action: &AgentAction, secrets: &[LoginSecrets], page: &dyn Page) -> Result<()> {
		match action {
			AgentAction::Goto { url } => {
				page.goto(&substitute(url, secrets)?, self.navigation_timeout_ms).await?;
			}
			AgentAction::Click { selector } => {
				page.wait_for_selector(selector, self.selector_timeout_ms).await?;
				page.click(selector).await?;
			}
			AgentAction::Type { selector, text } => {
				page.wait_for_selector(selector, self.selector_timeout_ms).await?;
				page.fill(selector, &substitute(text, secrets)?).await?;
			}
			AgentAction::WaitForSelector { selector, timeout_ms } => {
				page.wait_for_selector(selector, timeout_ms.unwrap_or(self.selector_timeout_ms)).await?;
			}
			AgentAction::Download { .. } => {
				return Err(warden_runtime::Error::Unsupported("download actions are not supported by this executor".into()).into());
			}
		}
		Ok(())
	}
}

#[async_trait]
impl AgentExecutor for ScriptedAgentExecutor {
	async fn execute(&self, agent: &Agent, logins: &[Login]) -> Result<()> {
		let lease = self.pool.acquire().await?;

		let mut result = Ok(());
		for login in logins {
			let Some(data) = &login.session_data else { continue };
			let applied = match self.sessions.decrypt_session(data) {
				Ok(snapshot) => self.sessions.apply_snapshot(lease.context(), lease.page(), &snapshot).await,
				Err(err) => Err(Error::from(err)),
			};
			if let Err(err) = applied {
				result = Err(err);
				break;
			}
		}
		if result.is_ok() {
			result = self.run_actions(agent, logins, lease.page()).await;
		}

		lease.release().await;
		info!(target = "warden.agent", agent = %agent.id, ok = result.is_ok(), "agent actions finished");
		result
	}
}

/// Resolves `{{login.*}}` placeholders against decrypted login secrets.
fn substitute(template: &str, secrets: &[LoginSecrets]) -> Result<String> {
	let rendered = render(template, |key| {
		let rest = key.strip_prefix("login.")?;
		let (index, field) = match rest.split_once('.') {
			Some((n, field)) => (n.parse::<usize>().ok()?, field),
			None => (0, rest),
		};
		let Some(secret) = secrets.get(index) else {
			return Some(Err(ScriptError::MissingCredential(format!("login {index}"))));
		};
		match field {
			"username" => Some(Ok(secret.username.clone())),
			"password" => Some(
				secret
					.password
					.clone()
					.ok_or_else(|| ScriptError::MissingCredential(format!("login {index} password"))),
			),
			_ => None,
		}
	})?;
	Ok(rendered)
}
