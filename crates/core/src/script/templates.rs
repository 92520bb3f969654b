//! Built-in login scripts for well-known sites.

use super::{LoginScript, LoginStep, UrlPattern};

/// Template ids accepted in a login's `templateId`.
pub const TEMPLATE_IDS: &[&str] = &["github", "gitlab", "wordpress", "generic"];

fn navigate(url: &str) -> LoginStep {
	LoginStep::Navigate { url: url.to_string() }
}

fn wait_for(selector: &str) -> LoginStep {
	LoginStep::Wait {
		selector: Some(selector.to_string()),
		ms: None,
		timeout_ms: None,
	}
}

fn fill(selector: &str, value: &str) -> LoginStep {
	LoginStep::Fill {
		selector: selector.to_string(),
		value: value.to_string(),
	}
}

fn click(selector: &str) -> LoginStep {
	LoginStep::Click {
		selector: selector.to_string(),
	}
}

fn settle() -> LoginStep {
	LoginStep::Wait {
		selector: None,
		ms: Some(2000),
		timeout_ms: None,
	}
}

fn pattern(source: &str) -> Option<UrlPattern> {
	// Template patterns are literals in this file.
	UrlPattern::new(source).ok()
}

/// Returns the built-in script named `id`.
pub fn template(id: &str) -> Option<LoginScript> {
	let script = match id.to_ascii_lowercase().as_str() {
		"github" => LoginScript {
			login_url: Some("https://github.com/login".into()),
			steps: vec![
				navigate("https://github.com/login"),
				wait_for("#login_field"),
				fill("#login_field", "{{username}}"),
				fill("#password", "{{password}}"),
				click("input[type=\"submit\"][name=\"commit\"]"),
				settle(),
			],
			success_url_pattern: pattern(r"^https://github\.com/?(\?.*)?$"),
			error_url_pattern: None,
			two_factor_selectors: vec!["#app_totp".into(), "input[name=\"otp\"]".into(), "#otp".into()],
		},
		"gitlab" => LoginScript {
			login_url: Some("https://gitlab.com/users/sign_in".into()),
			steps: vec![
				navigate("https://gitlab.com/users/sign_in"),
				wait_for("#user_login"),
				fill("#user_login", "{{username}}"),
				fill("#user_password", "{{password}}"),
				click("button[type=\"submit\"]"),
				settle(),
			],
			success_url_pattern: pattern(r"gitlab\.com/(dashboard|\?|$)"),
			error_url_pattern: None,
			two_factor_selectors: vec!["#user_otp_attempt".into()],
		},
		"wordpress" => LoginScript {
			login_url: None,
			steps: vec![
				navigate("{{siteUrl}}/wp-login.php"),
				wait_for("#user_login"),
				fill("#user_login", "{{username}}"),
				fill("#user_pass", "{{password}}"),
				click("#wp-submit"),
				settle(),
			],
			success_url_pattern: pattern("/wp-admin"),
			error_url_pattern: None,
			two_factor_selectors: vec!["#authcode".into(), "input[name=\"two-factor-totp-authcode\"]".into()],
		},
		// Common field names on a site-provided login page.
		"generic" => LoginScript {
			login_url: None,
			steps: vec![
				navigate("{{loginUrl}}"),
				wait_for("input[type=\"password\"]"),
				fill("input[type=\"email\"], input[name=\"username\"], input[name=\"email\"], input[name=\"login\"]", "{{username}}"),
				fill("input[type=\"password\"]", "{{password}}"),
				click("button[type=\"submit\"], input[type=\"submit\"]"),
				settle(),
			],
			success_url_pattern: None,
			error_url_pattern: pattern(r"[?&](error|failed)="),
			two_factor_selectors: Vec::new(),
		},
		_ => return None,
	};
	Some(script)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_listed_template_resolves() {
		for id in TEMPLATE_IDS {
			let script = template(id).unwrap_or_else(|| panic!("template {id} missing"));
			assert!(!script.steps.is_empty());
		}
		assert!(template("GitHub").is_some());
		assert!(template("myspace").is_none());
	}

	#[test]
	fn site_templates_carry_success_patterns() {
		for id in ["github", "gitlab", "wordpress"] {
			assert!(template(id).unwrap().success_url_pattern.is_some(), "{id} has no success pattern");
		}
		assert!(template("generic").unwrap().two_factor_selectors().len() > 1);
	}

	#[test]
	fn github_success_pattern_matches_home_only() {
		let script = template("github").unwrap();
		let success = script.success_url_pattern.unwrap();
		assert!(success.matches("https://github.com/"));
		assert!(!success.matches("https://github.com/session"));
		assert!(!success.matches("https://github.com/login"));
	}
}
