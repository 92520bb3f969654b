//! Executes login scripts against a live page.

use std::time::Duration;

use tracing::{debug, trace};
use warden_runtime::{DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_SELECTOR_TIMEOUT_MS, Page};

use super::{Credentials, LoginScript, LoginStep, ScriptError};
use crate::error::{Error, Result};

/// Username/email inputs tried, in order, when no script is configured.
pub const AUTO_DETECT_USERNAME_SELECTORS: &[&str] = &[
	"input[type=\"email\"]",
	"input[name=\"email\"]",
	"input[name=\"username\"]",
	"input[name=\"login\"]",
	"input[id*=\"user\"]",
	"input[autocomplete=\"username\"]",
	"input[type=\"text\"]",
];

pub const AUTO_DETECT_PASSWORD_SELECTORS: &[&str] = &[
	"input[type=\"password\"]",
	"input[name=\"password\"]",
	"input[autocomplete=\"current-password\"]",
];

pub const AUTO_DETECT_SUBMIT_SELECTORS: &[&str] = &[
	"button[type=\"submit\"]",
	"input[type=\"submit\"]",
	"button[name=\"login\"]",
	"button[id*=\"login\"]",
	"button[class*=\"login\"]",
	"button",
];

/// Runs [`LoginScript`] steps on one page with credential substitution.
pub struct ScriptRunner<'a> {
	page: &'a dyn Page,
	credentials: &'a Credentials,
	navigation_timeout_ms: u64,
	selector_timeout_ms: u64,
	settle_ms: u64,
}

impl<'a> ScriptRunner<'a> {
	pub fn new(page: &'a dyn Page, credentials: &'a Credentials) -> Self {
		Self {
			page,
			credentials,
			navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
			selector_timeout_ms: DEFAULT_SELECTOR_TIMEOUT_MS,
			settle_ms: 2000,
		}
	}

	pub fn with_timeouts(mut self, navigation_timeout_ms: u64, selector_timeout_ms: u64) -> Self {
		self.navigation_timeout_ms = navigation_timeout_ms;
		self.selector_timeout_ms = selector_timeout_ms;
		self
	}

	/// Pause after submitting an auto-detected form.
	pub fn with_settle_ms(mut self, settle_ms: u64) -> Self {
		self.settle_ms = settle_ms;
		self
	}

	/// Runs every step in order, stopping at the first failure.
	///
	/// Scripts that do not start with a `navigate` step first open the
	/// script's login URL, falling back to the login's own URL.
	pub async fn run(&self, script: &LoginScript) -> Result<()> {
		if !matches!(script.steps.first(), Some(LoginStep::Navigate { .. })) {
			let url = match &script.login_url {
				Some(url) => self.credentials.substitute(url)?,
				None => self.entry_url(),
			};
			self.goto(&url).await?;
		}

		for (index, step) in script.steps.iter().enumerate() {
			trace!(target = "warden.script", index, kind = step.kind(), "step");
			self.run_step(step).await?;
		}
		Ok(())
	}

	async fn run_step(&self, step: &LoginStep) -> Result<()> {
		match step {
			LoginStep::Navigate { url } => {
				let url = self.credentials.substitute(url)?;
				self.goto(&url).await
			}
			LoginStep::Fill { selector, value } => {
				let value = self.credentials.substitute(value)?;
				self.page.wait_for_selector(selector, self.selector_timeout_ms).await?;
				self.page.fill(selector, &value).await?;
				Ok(())
			}
			LoginStep::Click { selector } => {
				self.page.wait_for_selector(selector, self.selector_timeout_ms).await?;
				self.page.click(selector).await?;
				Ok(())
			}
			LoginStep::Wait {
				selector: Some(selector),
				timeout_ms,
				..
			} => {
				let timeout = timeout_ms.unwrap_or(self.selector_timeout_ms);
				self.page.wait_for_selector(selector, timeout).await?;
				Ok(())
			}
			LoginStep::Wait { ms, .. } => {
				tokio::time::sleep(Duration::from_millis(ms.unwrap_or_default())).await;
				Ok(())
			}
			LoginStep::Verify { selector, timeout_ms } => {
				let timeout = timeout_ms.unwrap_or(self.selector_timeout_ms);
				self.page
					.wait_for_selector(selector, timeout)
					.await
					.map_err(|_| ScriptError::VerificationFailed(selector.clone()))?;
				Ok(())
			}
		}
	}

	/// Logs in through the first visible username, password and submit controls.
	pub async fn auto_detect(&self) -> Result<()> {
		self.goto(&self.entry_url()).await?;

		let username = self
			.first_visible(AUTO_DETECT_USERNAME_SELECTORS)
			.await?
			.ok_or(ScriptError::FieldNotDetected("username"))?;
		let password = self
			.first_visible(AUTO_DETECT_PASSWORD_SELECTORS)
			.await?
			.ok_or(ScriptError::FieldNotDetected("password"))?;
		let submit = self
			.first_visible(AUTO_DETECT_SUBMIT_SELECTORS)
			.await?
			.ok_or(ScriptError::FieldNotDetected("submit"))?;
		debug!(target = "warden.script", %username, %password, %submit, "auto-detected login form");

		let secret = self
			.credentials
			.password
			.as_deref()
			.ok_or_else(|| ScriptError::MissingCredential("password".into()))?;
		self.page.fill(username, &self.credentials.username).await?;
		self.page.fill(password, secret).await?;
		self.page.click(submit).await?;

		if self.settle_ms > 0 {
			tokio::time::sleep(Duration::from_millis(self.settle_ms)).await;
		}
		Ok(())
	}

	/// Returns `true` when any of `selectors` is visible on the current page.
	pub async fn any_visible(&self, selectors: &[String]) -> bool {
		for selector in selectors {
			if matches!(self.page.is_visible(selector).await, Ok(true)) {
				return true;
			}
		}
		false
	}

	async fn first_visible(&self, candidates: &[&'static str]) -> Result<Option<&'static str>> {
		for candidate in candidates {
			if self.page.is_visible(candidate).await.map_err(Error::from)? {
				return Ok(Some(*candidate));
			}
		}
		Ok(None)
	}

	fn entry_url(&self) -> String {
		self.credentials
			.login_url
			.clone()
			.unwrap_or_else(|| self.credentials.site_url.clone())
	}

	async fn goto(&self, url: &str) -> Result<()> {
		debug!(target = "warden.script", %url, "navigate");
		self.page.goto(url, self.navigation_timeout_ms).await?;
		Ok(())
	}
}
