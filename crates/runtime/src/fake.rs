//! Scripted in-memory browser for testing policy code without a real engine.
//!
//! Sites are described as routes: visiting a URL lands on a [`FakeLanding`]
//! (final URL, title, visible selectors). A route can also depend on a cookie
//! being present in the context, which is how session replay is simulated.
//!
//! # Example
//!
//! ```ignore
//! let fake = FakeBrowser::new()
//!     .route("https://site.com/app", FakeLanding::new("https://site.com/login").titled("Sign in"))
//!     .route_with_session("https://site.com/app", "sid", FakeLanding::new("https://site.com/dashboard"));
//! let pool = BrowserPool::new(Arc::new(fake.clone()));
//! // ... run checks ...
//! assert_eq!(fake.stats().gotos, 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use warden_protocol::Cookie;

use crate::driver::{Browser, BrowserContext, BrowserLauncher, Page};
use crate::error::{Error, Result};

/// Where a navigation or click ends up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeLanding {
	pub url: String,
	pub title: String,
	pub visible: Vec<String>,
}

impl FakeLanding {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			..Default::default()
		}
	}

	pub fn titled(mut self, title: impl Into<String>) -> Self {
		self.title = title.into();
		self
	}

	/// Marks `selector` as rendered and visible on this landing.
	pub fn showing(mut self, selector: impl Into<String>) -> Self {
		self.visible.push(selector.into());
		self
	}
}

/// Counters and call logs collected by a [`FakeBrowser`].
#[derive(Debug, Clone, Default)]
pub struct FakeStats {
	pub launches: u32,
	pub browsers_closed: u32,
	pub contexts_created: u32,
	pub contexts_closed: u32,
	pub pages_closed: u32,
	pub gotos: u32,
	pub visited: Vec<String>,
	pub clicks: Vec<String>,
	pub fills: Vec<(String, String)>,
	pub user_agents: Vec<String>,
	pub init_scripts: Vec<String>,
	pub cookies_set: u32,
}

#[derive(Default)]
struct FakeConfig {
	routes: HashMap<String, FakeLanding>,
	session_routes: HashMap<String, (String, FakeLanding)>,
	click_routes: HashMap<String, FakeLanding>,
	goto_errors: HashMap<String, String>,
	missing_selectors: HashSet<String>,
	launch_error: Option<String>,
	set_cookies_error: Option<String>,
	evaluate_result: Value,
}

#[derive(Default)]
struct FakeInner {
	config: Mutex<FakeConfig>,
	stats: Mutex<FakeStats>,
}

/// Scripted browser driver. Clones share configuration and statistics.
#[derive(Clone, Default)]
pub struct FakeBrowser {
	inner: Arc<FakeInner>,
}

impl FakeBrowser {
	pub fn new() -> Self {
		Self::default()
	}

	/// Visiting `url` lands on `landing`.
	pub fn route(self, url: impl Into<String>, landing: FakeLanding) -> Self {
		self.inner.config.lock().routes.insert(url.into(), landing);
		self
	}

	/// Visiting `url` lands on `landing` when the context holds a cookie named `cookie`.
	pub fn route_with_session(self, url: impl Into<String>, cookie: impl Into<String>, landing: FakeLanding) -> Self {
		self.inner
			.config
			.lock()
			.session_routes
			.insert(url.into(), (cookie.into(), landing));
		self
	}

	/// Clicking `selector` navigates to `landing`.
	pub fn on_click(self, selector: impl Into<String>, landing: FakeLanding) -> Self {
		self.inner.config.lock().click_routes.insert(selector.into(), landing);
		self
	}

	/// Visiting `url` fails with `message`.
	pub fn fail_goto(self, url: impl Into<String>, message: impl Into<String>) -> Self {
		self.inner.config.lock().goto_errors.insert(url.into(), message.into());
		self
	}

	/// `selector` never appears: waits time out, clicks and fills fail.
	pub fn missing_selector(self, selector: impl Into<String>) -> Self {
		self.inner.config.lock().missing_selectors.insert(selector.into());
		self
	}

	pub fn fail_launch(self, message: impl Into<String>) -> Self {
		self.inner.config.lock().launch_error = Some(message.into());
		self
	}

	/// Every `set_cookies` call fails with a protocol error carrying `message`.
	pub fn fail_set_cookies(self, message: impl Into<String>) -> Self {
		self.inner.config.lock().set_cookies_error = Some(message.into());
		self
	}

	/// Value returned by every `evaluate` call (defaults to `null`).
	pub fn evaluate_returns(self, value: Value) -> Self {
		self.inner.config.lock().evaluate_result = value;
		self
	}

	pub fn stats(&self) -> FakeStats {
		self.inner.stats.lock().clone()
	}

	fn landing_for(&self, url: &str, cookies: &[Cookie]) -> FakeLanding {
		let config = self.inner.config.lock();
		if let Some((cookie, landing)) = config.session_routes.get(url) {
			if cookies.iter().any(|c| &c.name == cookie) {
				return landing.clone();
			}
		}
		config.routes.get(url).cloned().unwrap_or_else(|| FakeLanding::new(url))
	}

	fn selector_missing(&self, selector: &str) -> bool {
		self.inner.config.lock().missing_selectors.contains(selector)
	}
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
	async fn launch(&self) -> Result<Arc<dyn Browser>> {
		if let Some(message) = self.inner.config.lock().launch_error.clone() {
			return Err(Error::Launch(message));
		}
		self.inner.stats.lock().launches += 1;
		Ok(Arc::new(self.clone()))
	}
}

#[async_trait]
impl Browser for FakeBrowser {
	async fn new_context(&self) -> Result<Box<dyn BrowserContext>> {
		self.inner.stats.lock().contexts_created += 1;
		Ok(Box::new(FakeContext {
			browser: self.clone(),
			cookies: Arc::new(Mutex::new(Vec::new())),
		}))
	}

	async fn close(&self) -> Result<()> {
		self.inner.stats.lock().browsers_closed += 1;
		Ok(())
	}
}

struct FakeContext {
	browser: FakeBrowser,
	cookies: Arc<Mutex<Vec<Cookie>>>,
}

#[async_trait]
impl BrowserContext for FakeContext {
	async fn new_page(&self) -> Result<Box<dyn Page>> {
		Ok(Box::new(FakePage {
			browser: self.browser.clone(),
			cookies: Arc::clone(&self.cookies),
			current: Mutex::new(FakeLanding::new("about:blank")),
		}))
	}

	async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
		if let Some(message) = self.browser.inner.config.lock().set_cookies_error.clone() {
			return Err(Error::Protocol(message));
		}
		let mut jar = self.cookies.lock();
		for cookie in cookies {
			jar.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path));
			jar.push(cookie.clone());
		}
		self.browser.inner.stats.lock().cookies_set += cookies.len() as u32;
		Ok(())
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		Ok(self.cookies.lock().clone())
	}

	async fn close(&self) -> Result<()> {
		self.browser.inner.stats.lock().contexts_closed += 1;
		Ok(())
	}
}

struct FakePage {
	browser: FakeBrowser,
	cookies: Arc<Mutex<Vec<Cookie>>>,
	current: Mutex<FakeLanding>,
}

#[async_trait]
impl Page for FakePage {
	async fn goto(&self, url: &str, _timeout_ms: u64) -> Result<()> {
		{
			let mut stats = self.browser.inner.stats.lock();
			stats.gotos += 1;
			stats.visited.push(url.to_string());
		}
		if let Some(message) = self.browser.inner.config.lock().goto_errors.get(url).cloned() {
			return Err(Error::Navigation {
				url: url.to_string(),
				message,
			});
		}
		let cookies = self.cookies.lock().clone();
		*self.current.lock() = self.browser.landing_for(url, &cookies);
		Ok(())
	}

	async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
		if self.browser.selector_missing(selector) {
			return Err(Error::Timeout {
				timeout_ms,
				message: format!("waiting for selector \"{selector}\""),
			});
		}
		Ok(())
	}

	async fn click(&self, selector: &str) -> Result<()> {
		self.browser.inner.stats.lock().clicks.push(selector.to_string());
		if self.browser.selector_missing(selector) {
			return Err(Error::SelectorNotFound(selector.to_string()));
		}
		let next = self.browser.inner.config.lock().click_routes.get(selector).cloned();
		if let Some(landing) = next {
			*self.current.lock() = landing;
		}
		Ok(())
	}

	async fn fill(&self, selector: &str, value: &str) -> Result<()> {
		if self.browser.selector_missing(selector) {
			return Err(Error::SelectorNotFound(selector.to_string()));
		}
		self.browser
			.inner
			.stats
			.lock()
			.fills
			.push((selector.to_string(), value.to_string()));
		Ok(())
	}

	async fn is_visible(&self, selector: &str) -> Result<bool> {
		Ok(self.current.lock().visible.iter().any(|s| s == selector))
	}

	async fn evaluate(&self, _script: &str, _args: Value) -> Result<Value> {
		Ok(self.browser.inner.config.lock().evaluate_result.clone())
	}

	async fn add_init_script(&self, source: &str) -> Result<()> {
		self.browser.inner.stats.lock().init_scripts.push(source.to_string());
		Ok(())
	}

	async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
		self.browser.inner.stats.lock().user_agents.push(user_agent.to_string());
		Ok(())
	}

	async fn current_url(&self) -> Result<String> {
		Ok(self.current.lock().url.clone())
	}

	async fn title(&self) -> Result<String> {
		Ok(self.current.lock().title.clone())
	}

	async fn close(&self) -> Result<()> {
		self.browser.inner.stats.lock().pages_closed += 1;
		Ok(())
	}
}
