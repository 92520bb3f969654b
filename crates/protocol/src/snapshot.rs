//! Captured browser session snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cookie::Cookie;

/// Cookies, web storage and user agent captured from an authenticated page.
///
/// Serialization is lossless: decoding the JSON form yields a value equal to
/// the one that was encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
	#[serde(default)]
	pub cookies: Vec<Cookie>,
	#[serde(default)]
	pub local_storage: BTreeMap<String, String>,
	#[serde(default)]
	pub session_storage: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_agent: Option<String>,
	pub captured_at: DateTime<Utc>,
}

impl SessionSnapshot {
	pub fn empty(captured_at: DateTime<Utc>) -> Self {
		Self {
			cookies: Vec::new(),
			local_storage: BTreeMap::new(),
			session_storage: BTreeMap::new(),
			user_agent: None,
			captured_at,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.cookies.is_empty() && self.local_storage.is_empty() && self.session_storage.is_empty()
	}
}
