//! JSON file store with write-through persistence.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use warden_protocol::{Agent, AgentId, AgentRun, Login, LoginId, LoginStatusUpdate};

use super::{LoginStore, STORE_SCHEMA_VERSION, StoreData};
use crate::error::{Error, Result};

/// Store backed by a single JSON document.
///
/// Every mutation re-reads the file, applies the change, writes it to a
/// temporary file next to the store and renames it into place. Records added
/// by another process since `open` are kept. The in-memory state only changes
/// once the write succeeded.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	data: Mutex<StoreData>,
}

impl FileStore {
	/// Opens `path`, starting empty when the file does not exist yet.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let data = load(&path)?;
		debug!(target = "warden.store", path = %path.display(), logins = data.logins.len(), "store opened");
		Ok(Self {
			path,
			data: Mutex::new(data),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read<T>(&self, f: impl FnOnce(&StoreData) -> T) -> T {
		f(&self.data.lock())
	}

	fn mutate<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
		let mut guard = self.data.lock();
		let mut next = load(&self.path)?;
		let out = f(&mut next)?;
		save(&self.path, &next)?;
		*guard = next;
		Ok(out)
	}
}

fn load(path: &Path) -> Result<StoreData> {
	match fs::read_to_string(path) {
		Ok(content) => parse(path, &content),
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StoreData::default()),
		Err(err) => Err(err.into()),
	}
}

fn parse(path: &Path, content: &str) -> Result<StoreData> {
	let data: StoreData = serde_json::from_str(content)
		.map_err(|e| Error::Store(format!("{} is not a valid store file: {e}", path.display())))?;
	if data.schema > STORE_SCHEMA_VERSION {
		return Err(Error::Store(format!(
			"{} uses schema {} but this build supports up to {STORE_SCHEMA_VERSION}",
			path.display(),
			data.schema
		)));
	}
	Ok(data)
}

fn save(path: &Path, data: &StoreData) -> Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent)?;
	}
	let json = serde_json::to_string_pretty(data)?;
	let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
	fs::write(&tmp, json)?;
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
	}
	fs::rename(&tmp, path)?;
	Ok(())
}

#[async_trait]
impl LoginStore for FileStore {
	async fn get_login(&self, id: &LoginId) -> Result<Option<Login>> {
		Ok(self.read(|d| d.login(id).cloned()))
	}

	async fn list_logins(&self) -> Result<Vec<Login>> {
		Ok(self.read(|d| d.logins.clone()))
	}

	async fn insert_login(&self, login: Login) -> Result<()> {
		self.mutate(|d| d.insert_login(login))
	}

	async fn update_login(&self, login: Login) -> Result<()> {
		self.mutate(|d| d.update_login(login))
	}

	async fn apply_status_update(&self, update: &LoginStatusUpdate) -> Result<Login> {
		self.mutate(|d| d.apply_status_update(update))
	}

	async fn delete_login(&self, id: &LoginId) -> Result<()> {
		self.mutate(|d| d.delete_login(id))
	}

	async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>> {
		Ok(self.read(|d| d.agent(id).cloned()))
	}

	async fn list_agents(&self) -> Result<Vec<Agent>> {
		Ok(self.read(|d| d.agents.clone()))
	}

	async fn insert_agent(&self, agent: Agent) -> Result<()> {
		self.mutate(|d| d.insert_agent(agent))
	}

	async fn delete_agent(&self, id: &AgentId) -> Result<()> {
		self.mutate(|d| d.delete_agent(id))
	}

	async fn agent_logins(&self, agent_id: &AgentId) -> Result<Vec<Login>> {
		self.read(|d| d.agent_logins(agent_id))
	}

	async fn record_run(&self, run: AgentRun) -> Result<()> {
		self.mutate(|d| {
			d.record_run(run);
			Ok(())
		})
	}

	async fn list_runs(&self, agent_id: &AgentId) -> Result<Vec<AgentRun>> {
		Ok(self.read(|d| d.runs_for(agent_id)))
	}
}
