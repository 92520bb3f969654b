#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use warden::protocol::{Cookie, Login, LoginId, SessionSnapshot};
use warden::runtime::BrowserPool;
use warden::runtime::fake::FakeBrowser;
use warden::{AgentRunner, Catalog, CheckOptions, Cipher, LoginHealthChecker, LoginStore, MemoryStore, NewLogin, ScriptedAgentExecutor, SessionManager};

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A full engine wired to a [`FakeBrowser`] and an in-memory store.
pub struct World {
	pub fake: FakeBrowser,
	pub store: Arc<MemoryStore>,
	pub pool: Arc<BrowserPool>,
	pub sessions: Arc<SessionManager>,
	pub catalog: Catalog,
	pub checker: LoginHealthChecker,
	pub runner: AgentRunner,
}

pub fn world(fake: FakeBrowser) -> World {
	init_tracing();
	let cipher = Arc::new(Cipher::from_secret("integration-secret").expect("cipher"));
	let store = Arc::new(MemoryStore::new());
	let pool = Arc::new(BrowserPool::new(Arc::new(fake.clone())));
	let sessions = Arc::new(SessionManager::new(cipher));

	let checker = LoginHealthChecker::new(store.clone(), Arc::clone(&pool), Arc::clone(&sessions)).with_options(CheckOptions {
		check_delay: Duration::ZERO,
		settle_ms: 0,
		..CheckOptions::default()
	});
	let executor = Arc::new(ScriptedAgentExecutor::new(Arc::clone(&pool), Arc::clone(&sessions)));
	let runner = AgentRunner::new(store.clone(), Arc::clone(&pool), Arc::clone(&sessions), executor);
	let catalog = Catalog::new(store.clone(), Arc::clone(&sessions));

	World {
		fake,
		store,
		pool,
		sessions,
		catalog,
		checker,
		runner,
	}
}

impl World {
	/// Creates a login for `site` and lets `adjust` edit the stored record.
	pub async fn login(&self, name: &str, site: &str, adjust: impl FnOnce(&mut Login)) -> LoginId {
		let mut login = self
			.catalog
			.create_login(NewLogin {
				user_id: "user-1".into(),
				name: name.into(),
				site_url: site.into(),
				login_url: Some(format!("{site}/login")),
				username: "alice".into(),
				password: Some("correct-horse".into()),
				..NewLogin::default()
			})
			.await
			.expect("create login");
		adjust(&mut login);
		self.store.update_login(login.clone()).await.expect("update login");
		login.id
	}

	pub async fn stored(&self, id: &LoginId) -> Login {
		self.store.get_login(id).await.expect("store").expect("login exists")
	}

	pub fn encrypted_session(&self, cookie: &str) -> String {
		self.sessions.encrypt_session(&session_with(cookie)).expect("encrypt session")
	}
}

pub fn session_with(cookie: &str) -> SessionSnapshot {
	let mut snapshot = SessionSnapshot::empty(Utc::now());
	snapshot.cookies.push(Cookie::new(cookie, "token").with_domain(".site.com").with_path("/"));
	snapshot.local_storage.insert("remember".into(), "1".into());
	snapshot.user_agent = Some("Mozilla/5.0 (warden)".into());
	snapshot
}

/// Custom script filling `#user`/`#pass` and clicking `#submit` on `site`/login.
pub fn form_script(site: &str, error_pattern: Option<&str>) -> serde_json::Value {
	let mut config = serde_json::json!({
		"steps": [
			{"type": "navigate", "url": format!("{site}/login")},
			{"type": "fill", "selector": "#user", "value": "{{username}}"},
			{"type": "fill", "selector": "#pass", "value": "{{password}}"},
			{"type": "click", "selector": "#submit"}
		]
	});
	if let Some(pattern) = error_pattern {
		config["errorUrlPattern"] = serde_json::json!(pattern);
	}
	config
}
