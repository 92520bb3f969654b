use std::sync::Arc;

use serde_json::{Value, json};
use warden::{LoginStore, MemoryStore, WardenConfig};
use warden_cli::cli::Cli;
use warden_cli::commands;
use warden_cli::context::CommandContext;
use warden_cli::error::CliError;
use warden_cli::output::{ErrorCode, OutputFormat};
use warden_protocol::{LoginId, LoginStatus};
use warden_runtime::fake::{FakeBrowser, FakeLanding};

use clap::Parser;

fn config() -> WardenConfig {
	WardenConfig {
		encryption_key: Some("cli-secret".into()),
		check_delay_ms: 0,
		..WardenConfig::default()
	}
}

fn context(fake: &FakeBrowser) -> (CommandContext, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::new());
	let ctx = CommandContext::with_parts(config(), OutputFormat::Json, store.clone(), Arc::new(fake.clone())).expect("context");
	(ctx, store)
}

async fn run(ctx: &CommandContext, args: &[&str]) -> Result<Value, CliError> {
	let cli = Cli::try_parse_from(std::iter::once("warden").chain(args.iter().copied())).expect("arguments parse");
	commands::execute(ctx, cli.command).await.map(|output| output.data)
}

async fn add_login(ctx: &CommandContext, name: &str) -> String {
	let data = run(
		ctx,
		&["login", "add", "--name", name, "--site", "https://site.com", "--login-url", "https://site.com/login", "--username", "alice"],
	)
	.await
	.expect("login add");
	data["id"].as_str().expect("id").to_string()
}

#[tokio::test]
async fn added_login_is_listed_without_ciphertext() {
	let fake = FakeBrowser::new();
	let (ctx, _) = context(&fake);
	let id = add_login(&ctx, "mail").await;

	let shown = run(&ctx, &["login", "show", &id]).await.unwrap();
	assert_eq!(shown["status"], json!("NEEDS_TESTING"));
	assert_eq!(shown["hasSession"], json!(false));
	assert_eq!(shown["failureCount"], json!(0));
	assert!(shown.get("username").is_none());
	assert!(shown.get("password").is_none());

	let listed = run(&ctx, &["login", "list"]).await.unwrap();
	assert_eq!(listed.as_array().map(Vec::len), Some(1));
	assert_eq!(listed[0]["name"], json!("mail"));
}

#[tokio::test]
async fn reconnect_then_check_keeps_the_login_active() {
	let fake = FakeBrowser::new()
		.route("https://site.com/login", FakeLanding::new("https://site.com/home"))
		.evaluate_returns(json!({"localStorage": {"remember": "1"}, "sessionStorage": {}, "userAgent": "UA"}));
	let (ctx, store) = context(&fake);
	let id = add_login(&ctx, "mail").await;

	let reconnected = run(&ctx, &["login", "reconnect", &id, "--no-wait"]).await.unwrap();
	assert_eq!(reconnected["status"], json!("ACTIVE"));
	assert_eq!(reconnected["hasSession"], json!(true));

	let checked = run(&ctx, &["login", "check", &id]).await.unwrap();
	assert_eq!(checked["status"], json!("ACTIVE"));
	assert_eq!(checked["success"], json!(true));
	assert!(fake.stats().fills.is_empty());

	let stored = store.get_login(&LoginId::from(id.as_str())).await.unwrap().unwrap();
	assert_eq!(stored.failure_count, 0);
	assert_eq!(fake.stats().contexts_created, fake.stats().contexts_closed);
}

#[tokio::test]
async fn refused_run_reports_reconnect_code() {
	let fake = FakeBrowser::new();
	let (ctx, store) = context(&fake);
	let id = add_login(&ctx, "bank").await;

	let mut login = store.get_login(&LoginId::from(id.as_str())).await.unwrap().unwrap();
	login.status = LoginStatus::NeedsReconnect;
	store.update_login(login).await.unwrap();

	let agent = run(&ctx, &["agent", "add", "--name", "statements", "--login", &id]).await.unwrap();
	let agent_id = agent["id"].as_str().unwrap().to_string();

	let err = run(&ctx, &["agent", "run", &agent_id]).await.unwrap_err();
	let out = err.to_command_error();
	assert_eq!(out.code, ErrorCode::NeedsReconnect);
	assert_eq!(out.details, Some(json!({"logins": ["bank"]})));

	let runs = run(&ctx, &["agent", "runs", &agent_id]).await.unwrap();
	assert_eq!(runs[0]["status"], json!("REFUSED"));

	let status = run(&ctx, &["agent", "status", &agent_id]).await.unwrap();
	assert_eq!(status[0]["status"], json!("NEEDS_RECONNECT"));
	assert_eq!(fake.stats().launches, 0);
}

#[tokio::test]
async fn agent_actions_load_from_file_and_run() {
	let fake = FakeBrowser::new();
	let (ctx, _) = context(&fake);
	let id = add_login(&ctx, "portal").await;

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("actions.json");
	std::fs::write(&path, r##"[{"type": "goto", "url": "https://site.com/reports"}, {"type": "click", "selector": "#export"}]"##).unwrap();

	let agent = run(&ctx, &["agent", "add", "--name", "reports", "--login", &id, "--actions", path.to_str().unwrap()])
		.await
		.unwrap();
	assert_eq!(agent["actions"].as_array().map(Vec::len), Some(2));
	let agent_id = agent["id"].as_str().unwrap().to_string();

	let validations = run(&ctx, &["agent", "validate", &agent_id]).await.unwrap();
	assert_eq!(validations[0]["isValid"], json!(true));

	let result = run(&ctx, &["agent", "run", &agent_id]).await.unwrap();
	assert_eq!(result["status"], json!("SUCCEEDED"));
	assert_eq!(fake.stats().clicks, vec!["#export".to_string()]);
}

#[tokio::test]
async fn login_in_use_cannot_be_deleted() {
	let fake = FakeBrowser::new();
	let (ctx, _) = context(&fake);
	let id = add_login(&ctx, "shared").await;
	let agent = run(&ctx, &["agent", "add", "--name", "sync", "--login", &id]).await.unwrap();
	let agent_id = agent["id"].as_str().unwrap().to_string();

	let err = run(&ctx, &["login", "delete", &id]).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::LoginInUse);

	run(&ctx, &["agent", "delete", &agent_id]).await.unwrap();
	let deleted = run(&ctx, &["login", "delete", &id]).await.unwrap();
	assert_eq!(deleted["deleted"], json!(id));
}

#[tokio::test]
async fn input_errors_have_codes() {
	let fake = FakeBrowser::new();
	let (ctx, _) = context(&fake);

	let err = run(&ctx, &["login", "show", "missing"]).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::LoginNotFound);

	let err = run(&ctx, &["agent", "status", "missing"]).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::AgentNotFound);

	let err = run(
		&ctx,
		&["login", "add", "--name", "x", "--site", "https://x.com", "--username", "u", "--password-env", "WARDEN_TEST_UNSET_PASSWORD_VAR"],
	)
	.await
	.unwrap_err();
	assert_eq!(err.code(), ErrorCode::InvalidInput);
}

#[test]
fn context_requires_an_encryption_key() {
	let fake = FakeBrowser::new();
	let config = WardenConfig {
		encryption_key: None,
		..WardenConfig::default()
	};
	let err = CommandContext::with_parts(config, OutputFormat::Json, Arc::new(MemoryStore::new()), Arc::new(fake))
		.err()
		.expect("missing key is rejected");
	assert_eq!(err.code(), ErrorCode::ConfigError);
}
