//! Session capture and replay.
//!
//! A captured session is a [`SessionSnapshot`] (cookies, web storage, user
//! agent) stored encrypted on the login record. Replaying it means pushing the
//! snapshot into a fresh browser context, opening the login URL and judging
//! from the landing page whether the site still treats us as signed in.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};
use warden_protocol::{ProbeVerdict, SessionSnapshot};
use warden_runtime::{BrowserContext, BrowserPool, DEFAULT_NAVIGATION_TIMEOUT_MS, Page};

use crate::classify::{Landing, Rules};
use crate::crypto::{Cipher, DecryptionError};
use crate::error::Result;

/// Lifetime assumed for sessions whose cookies carry no expiry.
pub const DEFAULT_SESSION_LIFETIME_HOURS: i64 = 24;

const CAPTURE_STORAGE: &str = r#"() => {
	const dump = (open) => {
		const out = {};
		try {
			const store = open();
			for (let i = 0; i < store.length; i++) {
				const key = store.key(i);
				out[key] = store.getItem(key);
			}
		} catch (e) {}
		return out;
	};
	return {
		localStorage: dump(() => window.localStorage),
		sessionStorage: dump(() => window.sessionStorage),
		userAgent: navigator.userAgent,
	};
}"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapturedStorage {
	#[serde(default)]
	local_storage: BTreeMap<String, String>,
	#[serde(default)]
	session_storage: BTreeMap<String, String>,
	#[serde(default)]
	user_agent: Option<String>,
}

/// A stored session that could not be put back into a browser.
///
/// Distinct from a [`ProbeVerdict`]: the site was never asked.
#[derive(Debug, Error)]
pub enum RestoreError {
	#[error("Stored session is unusable: {0}")]
	Unusable(#[from] DecryptionError),

	#[error("Failed to restore session: {0}")]
	Apply(#[source] crate::error::Error),
}

/// Encrypts, replays and probes captured sessions.
pub struct SessionManager {
	cipher: Arc<Cipher>,
	rules: Arc<Rules>,
	navigation_timeout_ms: u64,
}

impl SessionManager {
	pub fn new(cipher: Arc<Cipher>) -> Self {
		Self {
			cipher,
			rules: Arc::new(Rules::default()),
			navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
		}
	}

	pub fn with_rules(mut self, rules: Arc<Rules>) -> Self {
		self.rules = rules;
		self
	}

	pub fn with_navigation_timeout(mut self, timeout_ms: u64) -> Self {
		self.navigation_timeout_ms = timeout_ms;
		self
	}

	pub fn cipher(&self) -> &Cipher {
		&self.cipher
	}

	pub fn encrypt_session(&self, snapshot: &SessionSnapshot) -> Result<String> {
		let json = serde_json::to_string(snapshot)?;
		self.cipher.encrypt_str(&json)
	}

	pub fn decrypt_session(&self, encrypted: &str) -> std::result::Result<SessionSnapshot, DecryptionError> {
		let json = self.cipher.decrypt_str(encrypted)?;
		serde_json::from_str(&json).map_err(|e| DecryptionError::Malformed(format!("invalid session payload: {e}")))
	}

	/// Pushes `snapshot` into a fresh context before the first navigation.
	///
	/// Cookies replace same-named cookies and storage entries overwrite equal
	/// keys, so applying a snapshot twice leaves the same state as once.
	pub async fn apply_snapshot(&self, context: &dyn BrowserContext, page: &dyn Page, snapshot: &SessionSnapshot) -> Result<()> {
		if let Some(user_agent) = &snapshot.user_agent {
			page.set_user_agent(user_agent).await?;
		}
		if !snapshot.cookies.is_empty() {
			context.set_cookies(&snapshot.cookies).await?;
		}
		if let Some(script) = storage_seed_script(snapshot)? {
			page.add_init_script(&script).await?;
		}
		debug!(
			target = "warden.session",
			cookies = snapshot.cookies.len(),
			local = snapshot.local_storage.len(),
			session = snapshot.session_storage.len(),
			"snapshot applied"
		);
		Ok(())
	}

	/// Opens `login_url` and judges the landing page, looking for a two-factor
	/// prompt with `two_factor_selectors`. Never returns an error: navigation
	/// and page failures become a reconnect verdict.
	pub async fn probe_session(&self, page: &dyn Page, login_url: &str, two_factor_selectors: &[String]) -> ProbeVerdict {
		if let Err(err) = page.goto(login_url, self.navigation_timeout_ms).await {
			debug!(target = "warden.session", %login_url, error = %err, "probe navigation failed");
			return ProbeVerdict::reconnect(err.to_string());
		}

		let landing = match observe(page, two_factor_selectors).await {
			Ok(landing) => landing,
			Err(err) => return ProbeVerdict::reconnect(err.to_string()),
		};
		let decision = self.rules.probe.classify(&landing);
		debug!(
			target = "warden.session",
			url = %landing.url,
			rule = decision.rule.unwrap_or("fallback"),
			valid = decision.outcome.is_valid,
			"session probed"
		);
		decision.outcome
	}

	/// Replays a decrypted snapshot in a fresh leased context and probes it.
	///
	/// A browser that cannot be reached is a reconnect verdict. A snapshot the
	/// context refuses is a [`RestoreError`].
	pub async fn replay_session(
		&self,
		pool: &BrowserPool,
		snapshot: &SessionSnapshot,
		login_url: &str,
		two_factor_selectors: &[String],
	) -> std::result::Result<ProbeVerdict, RestoreError> {
		let lease = match pool.acquire().await {
			Ok(lease) => lease,
			Err(err) => {
				warn!(target = "warden.session", error = %err, "could not acquire browser context");
				return Ok(ProbeVerdict::reconnect(err.to_string()));
			}
		};

		let outcome = match self.apply_snapshot(lease.context(), lease.page(), snapshot).await {
			Ok(()) => Ok(self.probe_session(lease.page(), login_url, two_factor_selectors).await),
			Err(err) => {
				debug!(target = "warden.session", error = %err, "snapshot rejected by context");
				Err(RestoreError::Apply(err))
			}
		};
		lease.release().await;
		outcome
	}

	/// Decrypts `session_data` and replays it.
	pub async fn validate_session(
		&self,
		pool: &BrowserPool,
		session_data: &str,
		login_url: &str,
		two_factor_selectors: &[String],
	) -> std::result::Result<ProbeVerdict, RestoreError> {
		let snapshot = self.decrypt_session(session_data)?;
		self.replay_session(pool, &snapshot, login_url, two_factor_selectors).await
	}

	/// Reads cookies, web storage and user agent from a live page.
	pub async fn capture_snapshot(&self, context: &dyn BrowserContext, page: &dyn Page) -> Result<SessionSnapshot> {
		let cookies = context.cookies().await?;
		let raw = page.evaluate(CAPTURE_STORAGE, json!([])).await?;
		let storage: CapturedStorage = match raw {
			Value::Null => CapturedStorage::default(),
			other => serde_json::from_value(other)?,
		};

		Ok(SessionSnapshot {
			cookies,
			local_storage: storage.local_storage,
			session_storage: storage.session_storage,
			user_agent: storage.user_agent.filter(|ua| !ua.is_empty()),
			captured_at: Utc::now(),
		})
	}
}

impl std::fmt::Debug for SessionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionManager")
			.field("navigation_timeout_ms", &self.navigation_timeout_ms)
			.finish_non_exhaustive()
	}
}

async fn observe(page: &dyn Page, two_factor_selectors: &[String]) -> warden_runtime::Result<Landing> {
	let url = page.current_url().await?;
	let title = page.title().await?;
	let mut two_factor_present = false;
	for selector in two_factor_selectors {
		if page.is_visible(selector).await.unwrap_or(false) {
			two_factor_present = true;
			break;
		}
	}
	Ok(Landing {
		url,
		title,
		two_factor_present,
		..Default::default()
	})
}

fn storage_seed_script(snapshot: &SessionSnapshot) -> Result<Option<String>> {
	if snapshot.local_storage.is_empty() && snapshot.session_storage.is_empty() {
		return Ok(None);
	}
	let local = serde_json::to_string(&snapshot.local_storage)?;
	let session = serde_json::to_string(&snapshot.session_storage)?;
	Ok(Some(format!(
		"(() => {{ const seed = (open, entries) => {{ try {{ const store = open(); for (const [k, v] of Object.entries(entries)) store.setItem(k, v); }} catch (e) {{}} }}; seed(() => window.localStorage, {local}); seed(() => window.sessionStorage, {session}); }})();"
	)))
}

/// Latest cookie expiry in `snapshot`.
///
/// Snapshots whose cookies carry no expiry are assumed to last
/// [`DEFAULT_SESSION_LIFETIME_HOURS`] from `now`; a snapshot without cookies
/// has no known expiry.
pub fn compute_session_expiry(snapshot: &SessionSnapshot, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
	if snapshot.cookies.is_empty() {
		return None;
	}

	let latest = snapshot
		.cookies
		.iter()
		.filter_map(|c| c.expiry_secs())
		.filter_map(|secs| DateTime::from_timestamp_millis((secs * 1000.0) as i64))
		.max();

	Some(latest.unwrap_or_else(|| now + Duration::hours(DEFAULT_SESSION_LIFETIME_HOURS)))
}

/// `true` only for a known expiry strictly before `now`.
pub fn is_expired(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
	expiry.is_some_and(|expiry| now > expiry)
}
