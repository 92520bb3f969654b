//! Credential-based login scripts.
//!
//! A script is an ordered list of [`LoginStep`]s plus the URL patterns used to
//! classify where the browser ends up. Scripts come from three places, tried
//! in order by [`ScriptSource::resolve`]:
//!
//! 1. a built-in template named by the login's `templateId`
//! 2. the login's `customConfig`, decoded and validated here
//! 3. auto-detection of common username/password/submit fields
//!
//! Decoding happens once, before any browser work, so malformed scripts
//! (unknown step types, empty selectors, invalid patterns) are reported
//! immediately instead of halfway through a login.

mod placeholders;
mod runner;
mod templates;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use warden_protocol::Login;

pub use placeholders::{Credentials, render};
pub use runner::{AUTO_DETECT_PASSWORD_SELECTORS, AUTO_DETECT_SUBMIT_SELECTORS, AUTO_DETECT_USERNAME_SELECTORS, ScriptRunner};
pub use templates::{TEMPLATE_IDS, template};

/// Selectors that indicate a two-factor or verification prompt.
pub const DEFAULT_TWO_FACTOR_SELECTORS: &[&str] = &[
	"input[autocomplete=\"one-time-code\"]",
	"input[name*=\"otp\"]",
	"input[name*=\"totp\"]",
	"input[name*=\"2fa\"]",
	"input[name*=\"verification\"]",
	"#otp",
	"#totp",
];

pub fn default_two_factor_selectors() -> Vec<String> {
	DEFAULT_TWO_FACTOR_SELECTORS.iter().map(|s| s.to_string()).collect()
}

/// Script loading and execution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
	#[error("Unknown step type: {0}")]
	UnknownStepType(String),

	#[error("Invalid step {index}: {message}")]
	InvalidStep { index: usize, message: String },

	#[error("Invalid login script: {0}")]
	InvalidScript(String),

	#[error("Invalid URL pattern {pattern:?}: {message}")]
	InvalidPattern { pattern: String, message: String },

	#[error("Missing credential: {0}")]
	MissingCredential(String),

	#[error("Verification failed: {0}")]
	VerificationFailed(String),

	#[error("Could not detect {0} field on login page")]
	FieldNotDetected(&'static str),
}

/// One step of a login script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LoginStep {
	Navigate {
		url: String,
	},
	Fill {
		selector: String,
		value: String,
	},
	Click {
		selector: String,
	},
	/// Waits for `selector` to appear, or sleeps for `ms` when no selector is given.
	#[serde(rename_all = "camelCase")]
	Wait {
		#[serde(default)]
		selector: Option<String>,
		#[serde(default)]
		ms: Option<u64>,
		#[serde(default)]
		timeout_ms: Option<u64>,
	},
	/// Fails the script unless `selector` appears.
	#[serde(rename_all = "camelCase")]
	Verify {
		selector: String,
		#[serde(default)]
		timeout_ms: Option<u64>,
	},
}

const STEP_TYPES: &[&str] = &["navigate", "fill", "click", "wait", "verify"];

impl LoginStep {
	/// Decodes and validates one raw step.
	pub fn decode(index: usize, raw: &Value) -> Result<Self, ScriptError> {
		let kind = raw.get("type").and_then(Value::as_str).ok_or_else(|| ScriptError::InvalidStep {
			index,
			message: "missing \"type\"".into(),
		})?;
		if !STEP_TYPES.contains(&kind) {
			return Err(ScriptError::UnknownStepType(kind.to_string()));
		}

		let step: LoginStep = serde_json::from_value(raw.clone()).map_err(|e| ScriptError::InvalidStep {
			index,
			message: e.to_string(),
		})?;
		step.validate(index)?;
		Ok(step)
	}

	fn validate(&self, index: usize) -> Result<(), ScriptError> {
		let invalid = |message: &str| ScriptError::InvalidStep {
			index,
			message: message.to_string(),
		};
		match self {
			LoginStep::Navigate { url } if url.trim().is_empty() => Err(invalid("navigate requires a url")),
			LoginStep::Fill { selector, .. } | LoginStep::Click { selector } | LoginStep::Verify { selector, .. } if selector.trim().is_empty() => {
				Err(invalid("selector must not be empty"))
			}
			LoginStep::Wait { selector: None, ms: None, .. } => Err(invalid("wait requires a selector or ms")),
			_ => Ok(()),
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			LoginStep::Navigate { .. } => "navigate",
			LoginStep::Fill { .. } => "fill",
			LoginStep::Click { .. } => "click",
			LoginStep::Wait { .. } => "wait",
			LoginStep::Verify { .. } => "verify",
		}
	}
}

/// A URL pattern compiled as a regular expression at load time.
///
/// Matching is unanchored, so a pattern without metacharacters (`error=`)
/// matches as a substring. Regex metacharacters keep their meaning: `?` and
/// `.` must be escaped to match literally.
#[derive(Debug, Clone)]
pub struct UrlPattern {
	source: String,
	regex: Regex,
}

impl UrlPattern {
	pub fn new(pattern: &str) -> Result<Self, ScriptError> {
		let regex = Regex::new(pattern).map_err(|e| ScriptError::InvalidPattern {
			pattern: pattern.to_string(),
			message: e.to_string(),
		})?;
		Ok(Self {
			source: pattern.to_string(),
			regex,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}

	pub fn matches(&self, url: &str) -> bool {
		self.regex.is_match(url)
	}
}

impl PartialEq for UrlPattern {
	fn eq(&self, other: &Self) -> bool {
		self.source == other.source
	}
}

/// A decoded, validated login script.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginScript {
	pub login_url: Option<String>,
	pub steps: Vec<LoginStep>,
	pub success_url_pattern: Option<UrlPattern>,
	pub error_url_pattern: Option<UrlPattern>,
	pub two_factor_selectors: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScript {
	#[serde(default)]
	login_url: Option<String>,
	#[serde(default)]
	steps: Vec<Value>,
	#[serde(default)]
	success_url_pattern: Option<String>,
	#[serde(default)]
	error_url_pattern: Option<String>,
	#[serde(default)]
	two_factor_selectors: Vec<String>,
}

impl LoginScript {
	/// Decodes a `customConfig` value.
	///
	/// Accepts either a full script object or a bare array of steps.
	pub fn from_config(config: &Value) -> Result<Self, ScriptError> {
		let raw = match config {
			Value::Array(steps) => RawScript {
				login_url: None,
				steps: steps.clone(),
				success_url_pattern: None,
				error_url_pattern: None,
				two_factor_selectors: Vec::new(),
			},
			Value::Object(_) => serde_json::from_value(config.clone()).map_err(|e| ScriptError::InvalidScript(e.to_string()))?,
			_ => return Err(ScriptError::InvalidScript("expected an object or an array of steps".into())),
		};

		if raw.steps.is_empty() {
			return Err(ScriptError::InvalidScript("script has no steps".into()));
		}

		let steps = raw
			.steps
			.iter()
			.enumerate()
			.map(|(index, step)| LoginStep::decode(index, step))
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self {
			login_url: raw.login_url,
			steps,
			success_url_pattern: raw.success_url_pattern.as_deref().map(UrlPattern::new).transpose()?,
			error_url_pattern: raw.error_url_pattern.as_deref().map(UrlPattern::new).transpose()?,
			two_factor_selectors: raw.two_factor_selectors,
		})
	}

	/// Two-factor selectors to check after the script, falling back to the defaults.
	pub fn two_factor_selectors(&self) -> Vec<String> {
		if self.two_factor_selectors.is_empty() {
			default_two_factor_selectors()
		} else {
			self.two_factor_selectors.clone()
		}
	}
}

/// Where a login's script came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptSource {
	Template { id: String, script: LoginScript },
	Custom(LoginScript),
	AutoDetect,
}

impl ScriptSource {
	/// Picks the script for `login`: known template, then custom config, then auto-detect.
	pub fn resolve(login: &Login) -> Result<Self, ScriptError> {
		if let Some(id) = login.template_id.as_deref() {
			if let Some(script) = template(id) {
				return Ok(ScriptSource::Template { id: id.to_string(), script });
			}
			tracing::debug!(target = "warden.script", template = %id, "unknown template id; falling back");
		}

		match &login.custom_config {
			Some(config) => Ok(ScriptSource::Custom(LoginScript::from_config(config)?)),
			None => Ok(ScriptSource::AutoDetect),
		}
	}

	/// Selectors that mark a two-factor prompt for this source.
	pub fn two_factor_selectors(&self) -> Vec<String> {
		match self {
			ScriptSource::Template { script, .. } | ScriptSource::Custom(script) => script.two_factor_selectors(),
			ScriptSource::AutoDetect => default_two_factor_selectors(),
		}
	}

	pub fn label(&self) -> String {
		match self {
			ScriptSource::Template { id, .. } => format!("template:{id}"),
			ScriptSource::Custom(_) => "custom".to_string(),
			ScriptSource::AutoDetect => "auto-detect".to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn decodes_full_script() {
		let script = LoginScript::from_config(&json!({
			"loginUrl": "https://site.com/login",
			"successUrlPattern": "/dashboard",
			"errorUrlPattern": "error=",
			"steps": [
				{"type": "navigate", "url": "https://site.com/login"},
				{"type": "fill", "selector": "#user", "value": "{{username}}"},
				{"type": "fill", "selector": "#pass", "value": "{{password}}"},
				{"type": "click", "selector": "button[type=submit]"},
				{"type": "wait", "ms": 500},
				{"type": "verify", "selector": "#account", "timeoutMs": 5000}
			]
		}))
		.unwrap();

		assert_eq!(script.steps.len(), 6);
		assert_eq!(script.steps[4], LoginStep::Wait {
			selector: None,
			ms: Some(500),
			timeout_ms: None
		});
		assert!(script.error_url_pattern.unwrap().matches("https://site.com/login?error=1"));
		assert!(script.success_url_pattern.unwrap().matches("https://site.com/dashboard"));
	}

	#[test]
	fn bare_step_array_is_accepted() {
		let script = LoginScript::from_config(&json!([{"type": "click", "selector": "#go"}])).unwrap();
		assert_eq!(script.steps, vec![LoginStep::Click { selector: "#go".into() }]);
		assert!(script.two_factor_selectors().len() >= 3);
	}

	#[test]
	fn unknown_step_type_is_reported_by_name() {
		let err = LoginScript::from_config(&json!([{"type": "hover", "selector": "#menu"}])).unwrap_err();
		assert_eq!(err, ScriptError::UnknownStepType("hover".into()));
		assert_eq!(err.to_string(), "Unknown step type: hover");
	}

	#[test]
	fn invalid_steps_fail_at_load() {
		assert!(matches!(
			LoginScript::from_config(&json!([{"type": "fill", "selector": "", "value": "x"}])),
			Err(ScriptError::InvalidStep { index: 0, .. })
		));
		assert!(matches!(
			LoginScript::from_config(&json!([{"type": "wait"}])),
			Err(ScriptError::InvalidStep { .. })
		));
		assert!(matches!(
			LoginScript::from_config(&json!([{"selector": "#x"}])),
			Err(ScriptError::InvalidStep { .. })
		));
		assert!(matches!(
			LoginScript::from_config(&json!({"steps": []})),
			Err(ScriptError::InvalidScript(_))
		));
	}

	#[test]
	fn invalid_pattern_fails_at_load() {
		let err = LoginScript::from_config(&json!({
			"errorUrlPattern": "(unclosed",
			"steps": [{"type": "click", "selector": "#go"}]
		}))
		.unwrap_err();
		assert!(matches!(err, ScriptError::InvalidPattern { .. }));
	}

	#[test]
	fn url_patterns_are_unanchored_regexes() {
		let plain = UrlPattern::new("error=").unwrap();
		assert!(plain.matches("https://site.com/login?error=1"));

		assert!(UrlPattern::new("?error=1").is_err());
		let escaped = UrlPattern::new(r"\?error=1").unwrap();
		assert!(escaped.matches("https://site.com/login?error=1"));
		assert!(!escaped.matches("https://site.com/login/error=1"));

		let dotted = UrlPattern::new("site.com").unwrap();
		assert!(dotted.matches("https://siteXcom/"));
	}

	#[test]
	fn sources_carry_their_two_factor_selectors() {
		let mut login = warden_protocol::Login {
			template_id: Some("github".into()),
			..crate::store::fixtures::login("gh")
		};
		let github = ScriptSource::resolve(&login).unwrap();
		assert!(github.two_factor_selectors().contains(&"#app_totp".to_string()));

		login.template_id = None;
		let auto = ScriptSource::resolve(&login).unwrap();
		assert_eq!(auto, ScriptSource::AutoDetect);
		assert_eq!(auto.two_factor_selectors(), default_two_factor_selectors());
	}
}
