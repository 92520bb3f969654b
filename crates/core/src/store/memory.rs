use async_trait::async_trait;
use parking_lot::RwLock;
use warden_protocol::{Agent, AgentId, AgentRun, Login, LoginId, LoginStatusUpdate};

use super::{LoginStore, StoreData};
use crate::error::Result;

/// Process-local store. Each call holds the lock only for the mutation itself.
#[derive(Debug, Default)]
pub struct MemoryStore {
	data: RwLock<StoreData>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_data(data: StoreData) -> Self {
		Self {
			data: RwLock::new(data),
		}
	}

	/// Copy of the current contents.
	pub fn snapshot(&self) -> StoreData {
		self.data.read().clone()
	}
}

#[async_trait]
impl LoginStore for MemoryStore {
	async fn get_login(&self, id: &LoginId) -> Result<Option<Login>> {
		Ok(self.data.read().login(id).cloned())
	}

	async fn list_logins(&self) -> Result<Vec<Login>> {
		Ok(self.data.read().logins.clone())
	}

	async fn insert_login(&self, login: Login) -> Result<()> {
		self.data.write().insert_login(login)
	}

	async fn update_login(&self, login: Login) -> Result<()> {
		self.data.write().update_login(login)
	}

	async fn apply_status_update(&self, update: &LoginStatusUpdate) -> Result<Login> {
		self.data.write().apply_status_update(update)
	}

	async fn delete_login(&self, id: &LoginId) -> Result<()> {
		self.data.write().delete_login(id)
	}

	async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>> {
		Ok(self.data.read().agent(id).cloned())
	}

	async fn list_agents(&self) -> Result<Vec<Agent>> {
		Ok(self.data.read().agents.clone())
	}

	async fn insert_agent(&self, agent: Agent) -> Result<()> {
		self.data.write().insert_agent(agent)
	}

	async fn delete_agent(&self, id: &AgentId) -> Result<()> {
		self.data.write().delete_agent(id)
	}

	async fn agent_logins(&self, agent_id: &AgentId) -> Result<Vec<Login>> {
		self.data.read().agent_logins(agent_id)
	}

	async fn record_run(&self, run: AgentRun) -> Result<()> {
		self.data.write().record_run(run);
		Ok(())
	}

	async fn list_runs(&self, agent_id: &AgentId) -> Result<Vec<AgentRun>> {
		Ok(self.data.read().runs_for(agent_id))
	}
}
