//! Browser cookie shape used inside captured sessions.

use serde::{Deserialize, Serialize};

/// Cookie `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

/// A single browser cookie.
///
/// `expires` is a unix timestamp in seconds. Session cookies carry `None` or a
/// negative value (`-1`), matching what browsers report over the DevTools protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires: Option<f64>,
	#[serde(default)]
	pub http_only: bool,
	#[serde(default)]
	pub secure: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub same_site: Option<SameSite>,
}

impl Cookie {
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: None,
			path: None,
			expires: None,
			http_only: false,
			secure: false,
			same_site: None,
		}
	}

	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());
		self
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	pub fn with_expires(mut self, expires: f64) -> Self {
		self.expires = Some(expires);
		self
	}

	/// Returns the absolute expiry in unix seconds, or `None` for session cookies.
	pub fn expiry_secs(&self) -> Option<f64> {
		self.expires.filter(|ts| *ts > 0.0 && ts.is_finite())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn session_cookie_has_no_expiry() {
		let cookie = Cookie::new("sid", "abc").with_expires(-1.0);
		assert_eq!(cookie.expiry_secs(), None);
		assert_eq!(Cookie::new("sid", "abc").expiry_secs(), None);
	}

	#[test]
	fn cookie_uses_browser_field_names() {
		let json = r#"{
  "name": "session",
  "value": "token",
  "domain": ".example.com",
  "path": "/",
  "expires": 1900000000.0,
  "httpOnly": true,
  "secure": true,
  "sameSite": "Lax"
}"#;
		let cookie: Cookie = serde_json::from_str(json).unwrap();
		assert!(cookie.http_only);
		assert_eq!(cookie.same_site, Some(SameSite::Lax));
		assert_eq!(cookie.expiry_secs(), Some(1_900_000_000.0));
	}

	#[test]
	fn fractional_expiry_survives_json() {
		for expires in [1_756_739_192.765_890_1, 1_700_000_000.000_001, 1_999_999_999.999_999] {
			let cookie = Cookie::new("sid", "1").with_expires(expires);
			let back: Cookie = serde_json::from_str(&serde_json::to_string(&cookie).unwrap()).unwrap();
			assert_eq!(back.expires.map(f64::to_bits), Some(expires.to_bits()), "{expires}");
		}
	}
}
