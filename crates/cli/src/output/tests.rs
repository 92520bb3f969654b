use serde_json::{Value, json};

use super::*;

#[test]
fn success_envelope_has_data_and_no_error() {
	let result = ResultBuilder::new("login list").data(json!([{"id": "a"}])).duration_ms(12).build();
	let value = serde_json::to_value(&result).unwrap();

	assert_eq!(value["ok"], json!(true));
	assert_eq!(value["command"], json!("login list"));
	assert_eq!(value["durationMs"], json!(12));
	assert_eq!(value["data"][0]["id"], json!("a"));
	assert!(value.get("error").is_none());
	assert!(value.get("diagnostics").is_none());
}

#[test]
fn failure_envelope_uses_screaming_codes() {
	let result: CommandResult<()> = ResultBuilder::new("agent run")
		.error(CommandError {
			code: ErrorCode::NeedsReconnect,
			message: "reconnect mail".into(),
			details: Some(json!({"logins": ["mail"]})),
		})
		.build();
	let value = serde_json::to_value(&result).unwrap();

	assert_eq!(value["ok"], json!(false));
	assert_eq!(value["error"]["code"], json!("NEEDS_RECONNECT"));
	assert_eq!(value["error"]["details"]["logins"][0], json!("mail"));
	assert!(value.get("data").is_none());
	assert_eq!(ErrorCode::NeedsReconnect.to_string(), "NEEDS_RECONNECT");
}

#[test]
fn builder_without_data_is_not_ok() {
	let result: CommandResult<()> = ResultBuilder::new("noop").build();
	assert!(!result.ok);
	assert!(result.duration_ms.is_some());
}

#[test]
fn json_rendering_parses_back() {
	let result = ResultBuilder::new("login show")
		.data(json!({"status": "ACTIVE"}))
		.diagnostic(DiagnosticLevel::Warning, "session expires soon")
		.build();
	let rendered = render_result(&result, OutputFormat::Json);
	let parsed: Value = serde_json::from_str(&rendered).unwrap();
	assert_eq!(parsed["data"]["status"], json!("ACTIVE"));
	assert_eq!(parsed["diagnostics"][0]["level"], json!("warning"));
}

#[test]
fn text_rendering_shows_error_line() {
	let result: CommandResult<()> = ResultBuilder::new("login check")
		.error(command_error(ErrorCode::LoginNotFound, "Login not found: x"))
		.duration_ms(3)
		.build();
	let rendered = render_result(&result, OutputFormat::Text);
	assert!(rendered.starts_with("Error [LOGIN_NOT_FOUND]: Login not found: x"));
	assert!(rendered.contains("Completed in 3ms"));
}

#[test]
fn toon_rendering_mentions_command() {
	let result = ResultBuilder::new("agent list").data(json!({"count": 0})).build();
	let rendered = render_result(&result, OutputFormat::Toon);
	assert!(rendered.contains("agent list"));
}

#[test]
fn format_parses_case_insensitively() {
	assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
	assert_eq!("toon".parse::<OutputFormat>(), Ok(OutputFormat::Toon));
	assert!("yaml".parse::<OutputFormat>().is_err());
	assert_eq!(OutputFormat::Text.to_string(), "text");
}
