//! Chromium driver over the DevTools protocol.
//!
//! Attaches to an already running Chromium started with
//! `--remote-debugging-port`. Every context is a separate DevTools browser
//! context, so cookies and storage never leak between leases.

mod connection;
mod discovery;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use warden_protocol::Cookie;

pub use connection::CdpConnection;
pub use discovery::{CdpVersionInfo, fetch_version, resolve_ws_url};

use crate::driver::{Browser, BrowserContext, BrowserLauncher, Page};
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const EXISTS_JS: &str = "(sel) => document.querySelector(sel) !== null";

const READY_JS: &str = "() => document.readyState === 'complete'";

const CLICK_JS: &str = r#"(sel) => {
	const el = document.querySelector(sel);
	if (!el) return false;
	el.scrollIntoView({ block: 'center' });
	el.click();
	return true;
}"#;

const FILL_JS: &str = r#"(sel, value) => {
	const el = document.querySelector(sel);
	if (!el) return false;
	el.focus();
	const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
	const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
	if (descriptor && descriptor.set) descriptor.set.call(el, value); else el.value = value;
	el.dispatchEvent(new Event('input', { bubbles: true }));
	el.dispatchEvent(new Event('change', { bubbles: true }));
	return true;
}"#;

const VISIBLE_JS: &str = r#"(sel) => {
	const el = document.querySelector(sel);
	if (!el) return false;
	const style = window.getComputedStyle(el);
	if (style.visibility === 'hidden' || style.display === 'none') return false;
	const rect = el.getBoundingClientRect();
	return rect.width > 0 && rect.height > 0;
}"#;

/// Connects a [`BrowserPool`](crate::BrowserPool) to a DevTools endpoint.
#[derive(Debug, Clone)]
pub struct CdpLauncher {
	endpoint: String,
	close_browser_on_shutdown: bool,
}

impl CdpLauncher {
	/// `endpoint` is either `http://host:port` or a browser `ws://` URL.
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			close_browser_on_shutdown: false,
		}
	}

	/// Sends `Browser.close` on shutdown instead of only disconnecting.
	pub fn close_browser_on_shutdown(mut self, close: bool) -> Self {
		self.close_browser_on_shutdown = close;
		self
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

#[async_trait]
impl BrowserLauncher for CdpLauncher {
	async fn launch(&self) -> Result<Arc<dyn Browser>> {
		let ws_url = resolve_ws_url(&self.endpoint).await?;
		let conn = CdpConnection::connect(&ws_url).await?;
		Ok(Arc::new(CdpBrowser {
			conn,
			close_browser_on_shutdown: self.close_browser_on_shutdown,
		}))
	}
}

struct CdpBrowser {
	conn: Arc<CdpConnection>,
	close_browser_on_shutdown: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedContext {
	browser_context_id: String,
}

#[async_trait]
impl Browser for CdpBrowser {
	async fn new_context(&self) -> Result<Box<dyn BrowserContext>> {
		let created: CreatedContext =
			serde_json::from_value(self.conn.send("Target.createBrowserContext", json!({ "disposeOnDetach": true }), None).await?)?;
		debug!(target = "warden.cdp", context = %created.browser_context_id, "browser context created");
		Ok(Box::new(CdpContext {
			conn: Arc::clone(&self.conn),
			context_id: created.browser_context_id,
		}))
	}

	async fn close(&self) -> Result<()> {
		if self.close_browser_on_shutdown {
			if let Err(err) = self.conn.send("Browser.close", json!({}), None).await {
				warn!(target = "warden.cdp", error = %err, "Browser.close failed");
			}
		}
		self.conn.disconnect().await;
		Ok(())
	}
}

struct CdpContext {
	conn: Arc<CdpConnection>,
	context_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedTarget {
	target_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachedTarget {
	session_id: String,
}

#[derive(Deserialize)]
struct CookieList {
	#[serde(default)]
	cookies: Vec<Cookie>,
}

fn cookie_param(cookie: &Cookie) -> Option<Value> {
	let domain = cookie.domain.as_ref()?;
	let mut param = json!({
		"name": cookie.name,
		"value": cookie.value,
		"domain": domain,
		"path": cookie.path.as_deref().unwrap_or("/"),
		"httpOnly": cookie.http_only,
		"secure": cookie.secure,
	});
	if let Some(expires) = cookie.expiry_secs() {
		param["expires"] = json!(expires);
	}
	if let Some(same_site) = cookie.same_site {
		param["sameSite"] = serde_json::to_value(same_site).ok()?;
	}
	Some(param)
}

#[async_trait]
impl BrowserContext for CdpContext {
	async fn new_page(&self) -> Result<Box<dyn Page>> {
		let created: CreatedTarget = serde_json::from_value(
			self.conn
				.send(
					"Target.createTarget",
					json!({ "url": "about:blank", "browserContextId": self.context_id }),
					None,
				)
				.await?,
		)?;
		let attached: AttachedTarget = serde_json::from_value(
			self.conn
				.send("Target.attachToTarget", json!({ "targetId": created.target_id, "flatten": true }), None)
				.await?,
		)?;

		let page = CdpPage {
			conn: Arc::clone(&self.conn),
			target_id: created.target_id,
			session_id: attached.session_id,
		};
		page.call("Page.enable", json!({})).await?;
		Ok(Box::new(page))
	}

	async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
		let params: Vec<Value> = cookies
			.iter()
			.filter_map(|cookie| {
				let param = cookie_param(cookie);
				if param.is_none() {
					debug!(target = "warden.cdp", name = %cookie.name, "skipping cookie without domain");
				}
				param
			})
			.collect();
		if params.is_empty() {
			return Ok(());
		}
		self.conn
			.send("Storage.setCookies", json!({ "cookies": params, "browserContextId": self.context_id }), None)
			.await?;
		Ok(())
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		let list: CookieList = serde_json::from_value(
			self.conn
				.send("Storage.getCookies", json!({ "browserContextId": self.context_id }), None)
				.await?,
		)?;
		Ok(list.cookies)
	}

	async fn close(&self) -> Result<()> {
		self.conn
			.send("Target.disposeBrowserContext", json!({ "browserContextId": self.context_id }), None)
			.await?;
		Ok(())
	}
}

struct CdpPage {
	conn: Arc<CdpConnection>,
	target_id: String,
	session_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Navigated {
	error_text: Option<String>,
}

impl CdpPage {
	async fn call(&self, method: &str, params: Value) -> Result<Value> {
		self.conn.send(method, params, Some(&self.session_id)).await
	}

	async fn eval_bool(&self, script: &str, args: Value) -> Result<bool> {
		Ok(self.evaluate(script, args).await?.as_bool().unwrap_or(false))
	}

	async fn eval_string(&self, expression: &str) -> Result<String> {
		let value = self.evaluate(expression, json!([])).await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	async fn poll_until(&self, script: &str, args: Value, timeout_ms: u64, what: String) -> Result<()> {
		let waited = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
			loop {
				if self.eval_bool(script, args.clone()).await? {
					return Ok(());
				}
				tokio::time::sleep(POLL_INTERVAL).await;
			}
		})
		.await;

		match waited {
			Ok(result) => result,
			Err(_) => Err(Error::Timeout { timeout_ms, message: what }),
		}
	}
}

fn call_expression(script: &str, args: &Value) -> String {
	let args = match args {
		Value::Array(_) => args.clone(),
		Value::Null => json!([]),
		other => json!([other]),
	};
	format!("({script})(...{args})")
}

#[async_trait]
impl Page for CdpPage {
	async fn goto(&self, url: &str, timeout_ms: u64) -> Result<()> {
		let navigated = tokio::time::timeout(Duration::from_millis(timeout_ms), self.call("Page.navigate", json!({ "url": url }))).await;
		let navigated: Navigated = match navigated {
			Ok(result) => serde_json::from_value(result.map_err(|e| Error::Navigation {
				url: url.to_string(),
				message: e.to_string(),
			})?)?,
			Err(_) => {
				return Err(Error::Timeout {
					timeout_ms,
					message: format!("navigating to {url}"),
				});
			}
		};

		if let Some(message) = navigated.error_text {
			return Err(Error::Navigation {
				url: url.to_string(),
				message,
			});
		}

		self.poll_until(READY_JS, json!([]), timeout_ms, format!("waiting for {url} to load")).await
	}

	async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
		self.poll_until(EXISTS_JS, json!([selector]), timeout_ms, format!("waiting for selector \"{selector}\""))
			.await
	}

	async fn click(&self, selector: &str) -> Result<()> {
		if self.eval_bool(CLICK_JS, json!([selector])).await? {
			Ok(())
		} else {
			Err(Error::SelectorNotFound(selector.to_string()))
		}
	}

	async fn fill(&self, selector: &str, value: &str) -> Result<()> {
		if self.eval_bool(FILL_JS, json!([selector, value])).await? {
			Ok(())
		} else {
			Err(Error::SelectorNotFound(selector.to_string()))
		}
	}

	async fn is_visible(&self, selector: &str) -> Result<bool> {
		self.eval_bool(VISIBLE_JS, json!([selector])).await
	}

	async fn evaluate(&self, script: &str, args: Value) -> Result<Value> {
		let response = self
			.call(
				"Runtime.evaluate",
				json!({
					"expression": call_expression(script, &args),
					"returnByValue": true,
					"awaitPromise": true,
				}),
			)
			.await?;

		if let Some(details) = response.get("exceptionDetails") {
			let message = details
				.pointer("/exception/description")
				.or_else(|| details.get("text"))
				.and_then(Value::as_str)
				.unwrap_or("uncaught exception");
			return Err(Error::Evaluation(message.to_string()));
		}

		Ok(response.pointer("/result/value").cloned().unwrap_or(Value::Null))
	}

	async fn add_init_script(&self, source: &str) -> Result<()> {
		self.call("Page.addScriptToEvaluateOnNewDocument", json!({ "source": source })).await?;
		Ok(())
	}

	async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
		self.call("Network.setUserAgentOverride", json!({ "userAgent": user_agent })).await?;
		Ok(())
	}

	async fn current_url(&self) -> Result<String> {
		self.eval_string("() => window.location.href").await
	}

	async fn title(&self) -> Result<String> {
		self.eval_string("() => document.title").await
	}

	async fn close(&self) -> Result<()> {
		self.conn
			.send("Target.closeTarget", json!({ "targetId": self.target_id }), None)
			.await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use warden_protocol::SameSite;

	use super::*;

	#[test]
	fn call_expression_spreads_arguments() {
		assert_eq!(call_expression("(a, b) => a + b", &json!([1, 2])), "((a, b) => a + b)(...[1,2])");
		assert_eq!(call_expression("() => 1", &Value::Null), "(() => 1)(...[])");
		assert_eq!(call_expression("(s) => s", &json!("x")), "((s) => s)(...[\"x\"])");
	}

	#[test]
	fn cookie_param_requires_domain() {
		assert!(cookie_param(&Cookie::new("sid", "1")).is_none());

		let mut cookie = Cookie::new("sid", "1").with_domain(".site.com").with_expires(1_900_000_000.0);
		cookie.same_site = Some(SameSite::Lax);
		let param = cookie_param(&cookie).unwrap();
		assert_eq!(param["path"], "/");
		assert_eq!(param["expires"], 1_900_000_000.0);
		assert_eq!(param["sameSite"], "Lax");
	}

	#[test]
	fn session_cookies_omit_expiry() {
		let cookie = Cookie::new("sid", "1").with_domain("site.com").with_expires(-1.0);
		assert!(cookie_param(&cookie).unwrap().get("expires").is_none());
	}

	#[test]
	fn storage_cookie_list_parses_devtools_shape() {
		let list: CookieList = serde_json::from_value(json!({
			"cookies": [{
				"name": "sid", "value": "1", "domain": ".site.com", "path": "/",
				"expires": -1, "size": 4, "httpOnly": true, "secure": true, "session": true,
				"priority": "Medium", "sameParty": false, "sourceScheme": "Secure", "sourcePort": 443
			}]
		}))
		.unwrap();
		assert_eq!(list.cookies.len(), 1);
		assert!(list.cookies[0].http_only);
		assert_eq!(list.cookies[0].expiry_secs(), None);
	}
}
