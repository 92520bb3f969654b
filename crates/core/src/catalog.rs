//! Login and agent management.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;
use warden_protocol::{Agent, AgentAction, AgentId, Login, LoginId, LoginStatus, LoginStatusUpdate, SessionSnapshot};

use crate::error::{Error, Result};
use crate::script::LoginScript;
use crate::session::{SessionManager, compute_session_expiry};
use crate::store::LoginStore;

/// Plaintext input for a new login.
#[derive(Clone, Default)]
pub struct NewLogin {
	pub user_id: String,
	pub name: String,
	pub site_url: String,
	pub login_url: Option<String>,
	pub username: String,
	pub password: Option<String>,
	pub oauth_token: Option<String>,
	pub template_id: Option<String>,
	pub custom_config: Option<Value>,
}

/// Fields to change on an existing login. `None` leaves a field as it is.
#[derive(Clone, Default)]
pub struct CredentialUpdate {
	pub username: Option<String>,
	pub password: Option<String>,
	pub oauth_token: Option<String>,
	pub login_url: Option<String>,
	pub template_id: Option<String>,
	pub custom_config: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAgent {
	pub user_id: String,
	pub name: String,
	pub logins: Vec<LoginId>,
	pub actions: Vec<AgentAction>,
}

/// Creates, updates and deletes logins and agents.
///
/// Credentials are encrypted here and nowhere else.
pub struct Catalog {
	store: Arc<dyn LoginStore>,
	sessions: Arc<SessionManager>,
}

impl Catalog {
	pub fn new(store: Arc<dyn LoginStore>, sessions: Arc<SessionManager>) -> Self {
		Self { store, sessions }
	}

	pub fn store(&self) -> &Arc<dyn LoginStore> {
		&self.store
	}

	async fn login(&self, id: &LoginId) -> Result<Login> {
		self.store.get_login(id).await?.ok_or_else(|| Error::LoginNotFound(id.clone()))
	}

	/// Stores a login with encrypted credentials and status `NEEDS_TESTING`.
	///
	/// A custom script is validated before anything is stored.
	pub async fn create_login(&self, input: NewLogin) -> Result<Login> {
		if input.name.trim().is_empty() {
			return Err(Error::Config("login name must not be empty".into()));
		}
		if input.site_url.trim().is_empty() {
			return Err(Error::Config("site url must not be empty".into()));
		}
		if let Some(config) = &input.custom_config {
			LoginScript::from_config(config)?;
		}

		let cipher = self.sessions.cipher();
		let now = Utc::now();
		let login = Login {
			id: LoginId::from(Uuid::new_v4().to_string()),
			user_id: input.user_id,
			name: input.name,
			site_url: input.site_url,
			login_url: input.login_url,
			username: cipher.encrypt_str(&input.username)?,
			password: input.password.as_deref().map(|p| cipher.encrypt_str(p)).transpose()?,
			oauth_token: input.oauth_token.as_deref().map(|t| cipher.encrypt_str(t)).transpose()?,
			session_data: None,
			session_expiry: None,
			status: LoginStatus::NeedsTesting,
			last_checked_at: None,
			last_success_at: None,
			last_failure_at: None,
			failure_count: 0,
			error_message: None,
			template_id: input.template_id,
			custom_config: input.custom_config,
			created_at: now,
			updated_at: now,
		};
		self.store.insert_login(login.clone()).await?;
		info!(target = "warden.catalog", login = %login.id, name = %login.name, "login created");
		Ok(login)
	}

	/// Applies a credential fix. The login goes back to `NEEDS_TESTING`.
	pub async fn update_credentials(&self, id: &LoginId, update: CredentialUpdate) -> Result<Login> {
		let mut login = self.login(id).await?;
		if let Some(config) = &update.custom_config {
			LoginScript::from_config(config)?;
		}

		let cipher = self.sessions.cipher();
		if let Some(username) = update.username {
			login.username = cipher.encrypt_str(&username)?;
		}
		if let Some(password) = update.password {
			login.password = Some(cipher.encrypt_str(&password)?);
		}
		if let Some(token) = update.oauth_token {
			login.oauth_token = Some(cipher.encrypt_str(&token)?);
		}
		if update.login_url.is_some() {
			login.login_url = update.login_url;
		}
		if update.template_id.is_some() {
			login.template_id = update.template_id;
		}
		if update.custom_config.is_some() {
			login.custom_config = update.custom_config;
		}
		login.status = LoginStatus::NeedsTesting;
		login.error_message = None;
		login.updated_at = Utc::now();

		self.store.update_login(login.clone()).await?;
		Ok(login)
	}

	/// Completes a reconnect: stores the captured session and marks the login `ACTIVE`.
	pub async fn store_session(&self, id: &LoginId, snapshot: &SessionSnapshot) -> Result<Login> {
		let mut login = self.login(id).await?;
		let now = Utc::now();
		login.session_data = Some(self.sessions.encrypt_session(snapshot)?);
		login.session_expiry = compute_session_expiry(snapshot, now);
		login.updated_at = now;
		self.store.update_login(login).await?;

		let login = self
			.store
			.apply_status_update(&LoginStatusUpdate {
				login_id: id.clone(),
				status: LoginStatus::Active,
				error_message: None,
				success: true,
				checked_at: now,
			})
			.await?;
		info!(target = "warden.catalog", login = %id, cookies = snapshot.cookies.len(), "session stored");
		Ok(login)
	}

	/// Drops the stored session so the next check uses credentials.
	pub async fn clear_session(&self, id: &LoginId) -> Result<Login> {
		let mut login = self.login(id).await?;
		login.session_data = None;
		login.session_expiry = None;
		login.updated_at = Utc::now();
		self.store.update_login(login.clone()).await?;
		Ok(login)
	}

	/// Deletes a login that no agent references.
	pub async fn delete_login(&self, id: &LoginId) -> Result<()> {
		self.store.delete_login(id).await?;
		info!(target = "warden.catalog", login = %id, "login deleted");
		Ok(())
	}

	pub async fn create_agent(&self, input: NewAgent) -> Result<Agent> {
		if input.name.trim().is_empty() {
			return Err(Error::Config("agent name must not be empty".into()));
		}
		let agent = Agent {
			id: AgentId::from(Uuid::new_v4().to_string()),
			user_id: input.user_id,
			name: input.name,
			logins: input.logins,
			actions: input.actions,
			created_at: Utc::now(),
		};
		self.store.insert_agent(agent.clone()).await?;
		info!(target = "warden.catalog", agent = %agent.id, logins = agent.logins.len(), "agent created");
		Ok(agent)
	}

	pub async fn delete_agent(&self, id: &AgentId) -> Result<()> {
		self.store.delete_agent(id).await
	}
}

#[cfg(test)]
mod tests {
	use chrono::Duration;
	use serde_json::json;
	use warden_protocol::Cookie;

	use super::*;
	use crate::crypto::Cipher;
	use crate::store::MemoryStore;

	fn catalog() -> (Catalog, Arc<Cipher>) {
		let cipher = Arc::new(Cipher::from_secret("catalog-test").unwrap());
		let sessions = Arc::new(SessionManager::new(Arc::clone(&cipher)));
		(Catalog::new(Arc::new(MemoryStore::new()), sessions), cipher)
	}

	fn new_login() -> NewLogin {
		NewLogin {
			user_id: "u1".into(),
			name: "Work mail".into(),
			site_url: "https://mail.example.com".into(),
			username: "alice".into(),
			password: Some("hunter2".into()),
			..NewLogin::default()
		}
	}

	#[tokio::test]
	async fn created_login_is_encrypted_and_untested() {
		let (catalog, cipher) = catalog();
		let login = catalog.create_login(new_login()).await.unwrap();

		assert_eq!(login.status, LoginStatus::NeedsTesting);
		assert_ne!(login.username, "alice");
		assert_eq!(cipher.decrypt_str(&login.username).unwrap(), "alice");
		assert_eq!(cipher.decrypt_str(login.password.as_deref().unwrap()).unwrap(), "hunter2");
		assert!(login.oauth_token.is_none());
	}

	#[tokio::test]
	async fn invalid_custom_script_is_rejected_up_front() {
		let (catalog, _) = catalog();
		let err = catalog
			.create_login(NewLogin {
				custom_config: Some(json!([{"type": "teleport"}])),
				..new_login()
			})
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "Unknown step type: teleport");
		assert!(catalog.store().list_logins().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn storing_a_session_activates_and_resets_failures() {
		let (catalog, _) = catalog();
		let login = catalog.create_login(new_login()).await.unwrap();
		for _ in 0..3 {
			catalog
				.store()
				.apply_status_update(&LoginStatusUpdate {
					login_id: login.id.clone(),
					status: LoginStatus::NeedsReconnect,
					error_message: Some("Session expired".into()),
					success: false,
					checked_at: Utc::now(),
				})
				.await
				.unwrap();
		}

		let expires = (Utc::now() + Duration::days(7)).timestamp() as f64;
		let mut snapshot = SessionSnapshot::empty(Utc::now());
		snapshot.cookies.push(Cookie::new("sid", "1").with_expires(expires));
		let updated = catalog.store_session(&login.id, &snapshot).await.unwrap();

		assert_eq!(updated.status, LoginStatus::Active);
		assert_eq!(updated.failure_count, 0);
		assert!(updated.error_message.is_none());
		assert_eq!(updated.session_expiry.map(|e| e.timestamp()), Some(expires as i64));
		assert!(updated.session_data.is_some());
	}

	#[tokio::test]
	async fn credential_update_keeps_failure_count() {
		let (catalog, cipher) = catalog();
		let login = catalog.create_login(new_login()).await.unwrap();
		catalog
			.store()
			.apply_status_update(&LoginStatusUpdate {
				login_id: login.id.clone(),
				status: LoginStatus::Expired,
				error_message: Some("Password expired".into()),
				success: false,
				checked_at: Utc::now(),
			})
			.await
			.unwrap();

		let updated = catalog
			.update_credentials(&login.id, CredentialUpdate {
				password: Some("new-pass".into()),
				..CredentialUpdate::default()
			})
			.await
			.unwrap();
		assert_eq!(updated.status, LoginStatus::NeedsTesting);
		assert_eq!(updated.failure_count, 1);
		assert_eq!(cipher.decrypt_str(updated.password.as_deref().unwrap()).unwrap(), "new-pass");
	}

	#[tokio::test]
	async fn agents_guard_their_logins() {
		let (catalog, _) = catalog();
		let login = catalog.create_login(new_login()).await.unwrap();
		let agent = catalog
			.create_agent(NewAgent {
				user_id: "u1".into(),
				name: "Invoices".into(),
				logins: vec![login.id.clone()],
				actions: Vec::new(),
			})
			.await
			.unwrap();

		assert!(matches!(catalog.delete_login(&login.id).await, Err(Error::LoginInUse { .. })));
		catalog.delete_agent(&agent.id).await.unwrap();
		catalog.delete_login(&login.id).await.unwrap();
	}
}
