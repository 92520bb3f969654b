//! Ordered predicate rules that turn page observations into statuses.
//!
//! Target sites signal "logged in", "bad password" or "needs 2FA" in fuzzy,
//! site-specific ways. Each decision point here is a [`Classifier`]: an
//! ordered list of named rules, the first matching rule wins, and a fallback
//! applies when none match. Site quirks are handled by inserting rules rather
//! than editing control flow.

use std::fmt;

use warden_protocol::{LoginStatus, ProbeVerdict};

type Predicate<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;

/// One named predicate and the outcome it produces.
pub struct Rule<C, O> {
	name: &'static str,
	predicate: Predicate<C>,
	outcome: O,
}

impl<C, O> Rule<C, O> {
	pub fn new(name: &'static str, predicate: impl Fn(&C) -> bool + Send + Sync + 'static, outcome: O) -> Self {
		Self {
			name,
			predicate: Box::new(predicate),
			outcome,
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}
}

/// First-match-wins rule list.
pub struct Classifier<C, O> {
	rules: Vec<Rule<C, O>>,
	fallback: O,
}

/// The outcome of a classification and the rule that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision<O> {
	/// `None` when the fallback applied.
	pub rule: Option<&'static str>,
	pub outcome: O,
}

impl<C, O: Clone> Classifier<C, O> {
	pub fn new(fallback: O) -> Self {
		Self {
			rules: Vec::new(),
			fallback,
		}
	}

	/// Appends a rule after the existing ones.
	pub fn rule(mut self, name: &'static str, predicate: impl Fn(&C) -> bool + Send + Sync + 'static, outcome: O) -> Self {
		self.rules.push(Rule::new(name, predicate, outcome));
		self
	}

	/// Inserts a rule at `index`, ahead of the rules currently there.
	pub fn insert(&mut self, index: usize, rule: Rule<C, O>) {
		let index = index.min(self.rules.len());
		self.rules.insert(index, rule);
	}

	pub fn rule_names(&self) -> Vec<&'static str> {
		self.rules.iter().map(|r| r.name).collect()
	}

	pub fn classify(&self, context: &C) -> Decision<O> {
		for rule in &self.rules {
			if (rule.predicate)(context) {
				return Decision {
					rule: Some(rule.name),
					outcome: rule.outcome.clone(),
				};
			}
		}
		Decision {
			rule: None,
			outcome: self.fallback.clone(),
		}
	}
}

impl<C, O: fmt::Debug> fmt::Debug for Classifier<C, O> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Classifier")
			.field("rules", &self.rules.iter().map(|r| r.name).collect::<Vec<_>>())
			.field("fallback", &self.fallback)
			.finish()
	}
}

/// What a page looked like when a script or probe finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Landing {
	pub url: String,
	pub title: String,
	pub two_factor_present: bool,
	pub success_matched: bool,
	pub error_matched: bool,
}

impl Landing {
	pub fn url_contains_any(&self, needles: &[&str]) -> bool {
		let url = self.url.to_ascii_lowercase();
		needles.iter().any(|n| url.contains(n))
	}

	/// URL or title looks like a sign-in page.
	pub fn looks_like_login(&self) -> bool {
		let title = self.title.to_ascii_lowercase();
		self.url_contains_any(LOGIN_MARKERS) || LOGIN_MARKERS.iter().any(|m| title.contains(m))
	}
}

/// Substrings that mark a sign-in page in a URL or title.
pub const LOGIN_MARKERS: &[&str] = &["login", "log in", "signin", "sign in", "sign-in", "sign_in", "auth"];

/// A status and the message stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOutcome {
	pub status: LoginStatus,
	pub error_message: Option<String>,
}

impl StatusOutcome {
	pub fn ok(status: LoginStatus) -> Self {
		Self {
			status,
			error_message: None,
		}
	}

	pub fn failed(status: LoginStatus, message: impl Into<String>) -> Self {
		Self {
			status,
			error_message: Some(message.into()),
		}
	}

	pub fn is_success(&self) -> bool {
		self.status.is_ready()
	}
}

pub const ERROR_PAGE_MESSAGE: &str = "Login failed - error page detected";
pub const STILL_ON_LOGIN_MESSAGE: &str = "Login failed - still on login page";
pub const TWO_FACTOR_MESSAGE: &str = "2FA required - please reconnect to complete verification";
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired - please reconnect";

/// Classifies where a credential login ended up.
///
/// Order: success pattern, error pattern, 2FA prompt, URL no longer on a
/// login page, then the "still on login page" fallback.
pub fn login_landing_rules() -> Classifier<Landing, StatusOutcome> {
	Classifier::new(StatusOutcome::failed(LoginStatus::Broken, STILL_ON_LOGIN_MESSAGE))
		.rule("success-url", |l: &Landing| l.success_matched, StatusOutcome::ok(LoginStatus::Active))
		.rule(
			"error-url",
			|l: &Landing| l.error_matched,
			StatusOutcome::failed(LoginStatus::Broken, ERROR_PAGE_MESSAGE),
		)
		.rule("two-factor", |l: &Landing| l.two_factor_present, StatusOutcome::ok(LoginStatus::Active))
		.rule(
			"left-login-page",
			|l: &Landing| !l.url_contains_any(&["login", "signin"]),
			StatusOutcome::ok(LoginStatus::Active),
		)
}

/// Classifies where a replayed session landed.
pub fn session_probe_rules() -> Classifier<Landing, ProbeVerdict> {
	Classifier::new(ProbeVerdict::valid())
		.rule(
			"login-page-with-2fa",
			|l: &Landing| l.looks_like_login() && l.two_factor_present,
			ProbeVerdict::reconnect(TWO_FACTOR_MESSAGE),
		)
		.rule("login-page", Landing::looks_like_login, ProbeVerdict::reconnect(SESSION_EXPIRED_MESSAGE))
}

/// Reclassifies a failed credential login by its error text.
pub fn failure_message_rules() -> Classifier<String, LoginStatus> {
	Classifier::new(LoginStatus::Broken)
		.rule(
			"expired",
			|m: &String| {
				let m = m.to_ascii_lowercase();
				m.contains("expired") || m.contains("invalid credentials")
			},
			LoginStatus::Expired,
		)
		.rule(
			"suspended",
			|m: &String| {
				let m = m.to_ascii_lowercase();
				m.contains("suspended") || m.contains("blocked")
			},
			LoginStatus::Suspended,
		)
}

/// The full rule set used by the health checker and the gate.
#[derive(Debug)]
pub struct Rules {
	pub landing: Classifier<Landing, StatusOutcome>,
	pub probe: Classifier<Landing, ProbeVerdict>,
	pub failure: Classifier<String, LoginStatus>,
}

impl Default for Rules {
	fn default() -> Self {
		Self {
			landing: login_landing_rules(),
			probe: session_probe_rules(),
			failure: failure_message_rules(),
		}
	}
}

impl Rules {
	/// Status and message for a credential login that failed with `message`.
	pub fn classify_failure(&self, message: &str) -> StatusOutcome {
		let status = self.failure.classify(&message.to_string()).outcome;
		StatusOutcome::failed(status, message)
	}
}
