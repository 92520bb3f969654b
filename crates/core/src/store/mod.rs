//! Login, agent and run persistence.
//!
//! [`LoginStore`] is the only persistence boundary the policy layer sees.
//! Both implementations keep a [`StoreData`] document and differ only in
//! whether mutations are written through to disk.

mod file;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warden_protocol::{Agent, AgentId, AgentRun, Login, LoginId, LoginStatusUpdate};

use crate::error::{Error, Result};

pub use file::FileStore;
pub use memory::MemoryStore;

pub(crate) const STORE_SCHEMA_VERSION: u32 = 1;

/// Point lookups and updates over logins, agents and run history.
#[async_trait]
pub trait LoginStore: Send + Sync {
	async fn get_login(&self, id: &LoginId) -> Result<Option<Login>>;

	async fn list_logins(&self) -> Result<Vec<Login>>;

	async fn insert_login(&self, login: Login) -> Result<()>;

	/// Replaces a stored login (credentials, session, script config).
	async fn update_login(&self, login: Login) -> Result<()>;

	/// Applies one health-check outcome and returns the updated record.
	async fn apply_status_update(&self, update: &LoginStatusUpdate) -> Result<Login>;

	/// Deletes a login. Fails with [`Error::LoginInUse`] while any agent references it.
	async fn delete_login(&self, id: &LoginId) -> Result<()>;

	async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>>;

	async fn list_agents(&self) -> Result<Vec<Agent>>;

	/// Inserts an agent. Every referenced login must exist.
	async fn insert_agent(&self, agent: Agent) -> Result<()>;

	async fn delete_agent(&self, id: &AgentId) -> Result<()>;

	/// Logins attached to `agent_id`, in attachment order.
	async fn agent_logins(&self, agent_id: &AgentId) -> Result<Vec<Login>>;

	/// Inserts or replaces a run by id.
	async fn record_run(&self, run: AgentRun) -> Result<()>;

	/// Runs of `agent_id`, oldest first.
	async fn list_runs(&self, agent_id: &AgentId) -> Result<Vec<AgentRun>>;
}

/// The whole store as one serializable document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreData {
	pub schema: u32,
	#[serde(default)]
	pub logins: Vec<Login>,
	#[serde(default)]
	pub agents: Vec<Agent>,
	#[serde(default)]
	pub runs: Vec<AgentRun>,
}

impl Default for StoreData {
	fn default() -> Self {
		Self {
			schema: STORE_SCHEMA_VERSION,
			logins: Vec::new(),
			agents: Vec::new(),
			runs: Vec::new(),
		}
	}
}

impl StoreData {
	pub fn login(&self, id: &LoginId) -> Option<&Login> {
		self.logins.iter().find(|l| &l.id == id)
	}

	fn login_mut(&mut self, id: &LoginId) -> Result<&mut Login> {
		self.logins
			.iter_mut()
			.find(|l| &l.id == id)
			.ok_or_else(|| Error::LoginNotFound(id.clone()))
	}

	pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
		self.agents.iter().find(|a| &a.id == id)
	}

	pub(crate) fn insert_login(&mut self, login: Login) -> Result<()> {
		if self.login(&login.id).is_some() {
			return Err(Error::Store(format!("login {} already exists", login.id)));
		}
		self.logins.push(login);
		Ok(())
	}

	pub(crate) fn update_login(&mut self, login: Login) -> Result<()> {
		let id = login.id.clone();
		*self.login_mut(&id)? = login;
		Ok(())
	}

	pub(crate) fn apply_status_update(&mut self, update: &LoginStatusUpdate) -> Result<Login> {
		let login = self.login_mut(&update.login_id)?;
		update.apply_to(login);
		Ok(login.clone())
	}

	pub(crate) fn delete_login(&mut self, id: &LoginId) -> Result<()> {
		if self.login(id).is_none() {
			return Err(Error::LoginNotFound(id.clone()));
		}
		let users: Vec<String> = self
			.agents
			.iter()
			.filter(|a| a.logins.contains(id))
			.map(|a| a.name.clone())
			.collect();
		if !users.is_empty() {
			return Err(Error::LoginInUse {
				login: id.clone(),
				agents: users,
			});
		}
		self.logins.retain(|l| &l.id != id);
		Ok(())
	}

	pub(crate) fn insert_agent(&mut self, agent: Agent) -> Result<()> {
		if self.agent(&agent.id).is_some() {
			return Err(Error::Store(format!("agent {} already exists", agent.id)));
		}
		if let Some(missing) = agent.logins.iter().find(|id| self.login(id).is_none()) {
			return Err(Error::LoginNotFound(missing.clone()));
		}
		self.agents.push(agent);
		Ok(())
	}

	pub(crate) fn delete_agent(&mut self, id: &AgentId) -> Result<()> {
		if self.agent(id).is_none() {
			return Err(Error::AgentNotFound(id.clone()));
		}
		self.agents.retain(|a| &a.id != id);
		self.runs.retain(|r| &r.agent_id != id);
		Ok(())
	}

	pub(crate) fn agent_logins(&self, agent_id: &AgentId) -> Result<Vec<Login>> {
		let agent = self.agent(agent_id).ok_or_else(|| Error::AgentNotFound(agent_id.clone()))?;
		agent
			.logins
			.iter()
			.map(|id| self.login(id).cloned().ok_or_else(|| Error::LoginNotFound(id.clone())))
			.collect()
	}

	pub(crate) fn record_run(&mut self, run: AgentRun) {
		match self.runs.iter_mut().find(|r| r.id == run.id) {
			Some(existing) => *existing = run,
			None => self.runs.push(run),
		}
	}

	pub(crate) fn runs_for(&self, agent_id: &AgentId) -> Vec<AgentRun> {
		self.runs.iter().filter(|r| &r.agent_id == agent_id).cloned().collect()
	}
}
