//! DevTools endpoint discovery.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// `/json/version` response subset from Chrome DevTools Protocol.
#[derive(Debug, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
	#[serde(rename = "User-Agent")]
	pub user_agent: Option<String>,
}

/// Resolves the browser websocket URL for `endpoint`.
///
/// `ws://` and `wss://` endpoints are used as-is; `http(s)://host:port`
/// endpoints are resolved through `/json/version`.
pub async fn resolve_ws_url(endpoint: &str) -> Result<String> {
	if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
		return Ok(endpoint.to_string());
	}
	Ok(fetch_version(endpoint).await?.web_socket_debugger_url)
}

/// Fetches `/json/version` from an HTTP DevTools endpoint.
pub async fn fetch_version(endpoint: &str) -> Result<CdpVersionInfo> {
	let client = reqwest::Client::builder()
		.timeout(Duration::from_millis(2000))
		.build()
		.map_err(|e| Error::Launch(format!("Failed to create HTTP client: {e}")))?;

	let url = version_url(endpoint);
	let response = client
		.get(&url)
		.send()
		.await
		.map_err(|e| Error::Launch(format!("No DevTools endpoint at {url}: {e}")))?;

	if !response.status().is_success() {
		return Err(Error::Launch(format!("DevTools endpoint {url} returned status {}", response.status())));
	}

	response
		.json::<CdpVersionInfo>()
		.await
		.map_err(|e| Error::Launch(format!("Failed to parse DevTools version response: {e}")))
}

fn version_url(endpoint: &str) -> String {
	let base = endpoint.trim_end_matches('/');
	if base.ends_with("/json/version") {
		base.to_string()
	} else {
		format!("{base}/json/version")
	}
}
