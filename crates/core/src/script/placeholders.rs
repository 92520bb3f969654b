//! `{{name}}` placeholder substitution for script values.

use std::fmt;

use super::ScriptError;

/// Decrypted credentials available to a running login script.
#[derive(Clone, Default)]
pub struct Credentials {
	pub username: String,
	pub password: Option<String>,
	pub oauth_token: Option<String>,
	pub site_url: String,
	pub login_url: Option<String>,
}

impl Credentials {
	/// Substitutes `{{username}}`, `{{password}}`, `{{oauthToken}}`, `{{siteUrl}}`
	/// and `{{loginUrl}}` in `template`. Unknown placeholders are left as-is.
	pub fn substitute(&self, template: &str) -> Result<String, ScriptError> {
		render(template, |key| match key {
			"username" => Some(Ok(self.username.clone())),
			"password" => Some(self.password.clone().ok_or_else(|| ScriptError::MissingCredential("password".into()))),
			"oauthToken" => Some(
				self.oauth_token
					.clone()
					.ok_or_else(|| ScriptError::MissingCredential("oauthToken".into())),
			),
			"siteUrl" => Some(Ok(self.site_url.trim_end_matches('/').to_string())),
			"loginUrl" => Some(Ok(self.login_url.clone().unwrap_or_else(|| self.site_url.clone()))),
			_ => None,
		})
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.field("oauth_token", &self.oauth_token.as_ref().map(|_| "<redacted>"))
			.field("site_url", &self.site_url)
			.finish()
	}
}

/// Replaces every `{{ key }}` in `template` using `resolve`.
///
/// `resolve` returns `None` for keys it does not know (the placeholder is kept
/// verbatim) and `Some(Err(_))` for known keys without a value.
pub fn render<F>(template: &str, mut resolve: F) -> Result<String, ScriptError>
where
	F: FnMut(&str) -> Option<Result<String, ScriptError>>,
{
	let mut out = String::with_capacity(template.len());
	let mut rest = template;

	while let Some(start) = rest.find("{{") {
		let Some(len) = rest[start + 2..].find("}}") else {
			break;
		};
		let placeholder = &rest[start..start + 2 + len + 2];
		let key = rest[start + 2..start + 2 + len].trim();

		out.push_str(&rest[..start]);
		match resolve(key) {
			Some(value) => out.push_str(&value?),
			None => out.push_str(placeholder),
		}
		rest = &rest[start + placeholder.len()..];
	}

	out.push_str(rest);
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn creds() -> Credentials {
		Credentials {
			username: "alice".into(),
			password: Some("s3cret".into()),
			oauth_token: None,
			site_url: "https://site.com/".into(),
			login_url: None,
		}
	}

	#[test]
	fn substitutes_known_placeholders() {
		let c = creds();
		assert_eq!(c.substitute("{{username}}").unwrap(), "alice");
		assert_eq!(c.substitute("u={{ username }}&p={{password}}").unwrap(), "u=alice&p=s3cret");
		assert_eq!(c.substitute("{{siteUrl}}/login").unwrap(), "https://site.com/login");
		assert_eq!(c.substitute("plain").unwrap(), "plain");
	}

	#[test]
	fn unknown_and_unterminated_placeholders_are_kept() {
		let c = creds();
		assert_eq!(c.substitute("{{other}} {{username}}").unwrap(), "{{other}} alice");
		assert_eq!(c.substitute("{{username").unwrap(), "{{username");
	}

	#[test]
	fn missing_credential_is_an_error() {
		let err = creds().substitute("{{oauthToken}}").unwrap_err();
		assert_eq!(err, ScriptError::MissingCredential("oauthToken".into()));
	}

	#[test]
	fn debug_redacts_secrets() {
		let printed = format!("{:?}", creds());
		assert!(!printed.contains("s3cret"));
		assert!(printed.contains("<redacted>"));
	}
}
