//! Effector traits implemented by browser drivers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use warden_protocol::Cookie;

use crate::error::Result;

/// A single page (tab) inside a browser context.
#[async_trait]
pub trait Page: Send + Sync {
	/// Navigates and waits for the document to finish loading.
	async fn goto(&self, url: &str, timeout_ms: u64) -> Result<()>;

	/// Waits until an element matching `selector` exists in the document.
	async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()>;

	async fn click(&self, selector: &str) -> Result<()>;

	/// Replaces the value of an input and fires `input`/`change` events.
	async fn fill(&self, selector: &str, value: &str) -> Result<()>;

	/// Returns `true` when an element matching `selector` is rendered and visible.
	async fn is_visible(&self, selector: &str) -> Result<bool>;

	/// Calls the JavaScript function expression `script` with `args` spread as
	/// positional arguments and returns its JSON-serializable result.
	async fn evaluate(&self, script: &str, args: Value) -> Result<Value>;

	/// Registers a script that runs in every new document before page scripts.
	async fn add_init_script(&self, source: &str) -> Result<()>;

	async fn set_user_agent(&self, user_agent: &str) -> Result<()>;

	async fn current_url(&self) -> Result<String>;

	async fn title(&self) -> Result<String>;

	async fn close(&self) -> Result<()>;
}

/// An isolated cookie/storage jar inside a browser.
#[async_trait]
pub trait BrowserContext: Send + Sync {
	async fn new_page(&self) -> Result<Box<dyn Page>>;

	async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()>;

	async fn cookies(&self) -> Result<Vec<Cookie>>;

	async fn close(&self) -> Result<()>;
}

/// A running browser instance.
#[async_trait]
pub trait Browser: Send + Sync {
	async fn new_context(&self) -> Result<Box<dyn BrowserContext>>;

	async fn close(&self) -> Result<()>;
}

/// Creates the browser owned by a [`BrowserPool`](crate::BrowserPool).
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
	async fn launch(&self) -> Result<Arc<dyn Browser>>;
}
