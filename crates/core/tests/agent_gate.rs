mod common;

use chrono::{Duration, Utc};
use common::world;
use warden::protocol::{AgentAction, AgentId, LoginStatus, RunStatus};
use warden::runtime::fake::{FakeBrowser, FakeLanding};
use warden::{Error, LoginStore, NewAgent};

async fn agent(w: &common::World, logins: Vec<warden::protocol::LoginId>, actions: Vec<AgentAction>) -> AgentId {
	w.catalog
		.create_agent(NewAgent {
			user_id: "user-1".into(),
			name: "exporter".into(),
			logins,
			actions,
		})
		.await
		.expect("create agent")
		.id
}

#[tokio::test]
async fn validation_follows_status_rules_in_attachment_order() -> anyhow::Result<()> {
	let w = world(FakeBrowser::new());
	let expired = w
		.login("expired", "https://a.com", |l| {
			l.status = LoginStatus::Active;
			l.session_expiry = Some(Utc::now() - Duration::minutes(1));
		})
		.await;
	let reconnect = w
		.login("reconnect", "https://b.com", |l| {
			l.status = LoginStatus::NeedsReconnect;
			l.error_message = Some("2FA required - please reconnect to complete verification".into());
		})
		.await;
	let suspended = w.login("suspended", "https://c.com", |l| l.status = LoginStatus::Suspended).await;
	let untested = w.login("untested", "https://d.com", |_| {}).await;
	let id = agent(&w, vec![untested.clone(), suspended, reconnect, expired], Vec::new()).await;

	let validations = w.runner.validate_agent_logins(&id).await?;

	let names: Vec<&str> = validations.iter().map(|v| v.login_name.as_str()).collect();
	assert_eq!(names, vec!["untested", "suspended", "reconnect", "expired"]);

	assert!(validations[0].is_valid);
	assert_eq!(validations[0].login_id, untested);

	assert!(!validations[1].is_valid);
	assert!(!validations[1].needs_reconnect);
	assert_eq!(validations[1].error_message.as_deref(), Some("Login status is SUSPENDED"));

	assert!(validations[2].needs_reconnect);
	assert_eq!(
		validations[2].error_message.as_deref(),
		Some("2FA required - please reconnect to complete verification")
	);

	assert!(validations[3].needs_reconnect);
	assert_eq!(validations[3].error_message.as_deref(), Some("Session expired"));

	assert_eq!(w.fake.stats().launches, 0);
	Ok(())
}

#[tokio::test]
async fn active_session_is_reprobed() -> anyhow::Result<()> {
	let fake = FakeBrowser::new()
		.route("https://site.com/login", FakeLanding::new("https://site.com/login"))
		.route_with_session("https://site.com/login", "sid", FakeLanding::new("https://site.com/app"));
	let w = world(fake);
	let good_session = w.encrypted_session("sid");
	let stale_session = w.encrypted_session("old");
	let good = w
		.login("good", "https://site.com", |l| {
			l.status = LoginStatus::Active;
			l.session_data = Some(good_session);
		})
		.await;
	let stale = w
		.login("stale", "https://site.com", |l| {
			l.status = LoginStatus::Active;
			l.session_data = Some(stale_session);
		})
		.await;
	let id = agent(&w, vec![good, stale.clone()], Vec::new()).await;

	let validations = w.runner.validate_agent_logins(&id).await?;

	assert!(validations[0].is_valid);
	assert!(!validations[1].is_valid);
	assert!(validations[1].needs_reconnect);
	assert_eq!(w.fake.stats().contexts_closed, 2);
	assert_eq!(w.stored(&stale).await.status, LoginStatus::Active);
	Ok(())
}

#[tokio::test]
async fn reconnect_refusal_takes_precedence_and_is_recorded() -> anyhow::Result<()> {
	let w = world(FakeBrowser::new());
	let broken = w.login("broken", "https://a.com", |l| l.status = LoginStatus::Broken).await;
	let stale = w.login("stale", "https://b.com", |l| l.status = LoginStatus::Disconnected).await;
	let id = agent(
		&w,
		vec![broken, stale],
		vec![AgentAction::Goto {
			url: "https://a.com/export".into(),
		}],
	)
	.await;

	let err = w.runner.execute_agent(&id).await.unwrap_err();

	match &err {
		Error::NeedsReconnect { logins } => assert_eq!(logins, &vec!["stale".to_string()]),
		other => panic!("expected NeedsReconnect, got {other:?}"),
	}
	assert!(err.is_precondition_failure());
	assert_eq!(w.fake.stats().gotos, 0);

	let runs = w.runner.list_runs(&id).await?;
	assert_eq!(runs.len(), 1);
	assert_eq!(runs[0].status, RunStatus::Refused);
	assert!(runs[0].error_message.as_deref().unwrap_or_default().contains("stale"));
	Ok(())
}

#[tokio::test]
async fn invalid_logins_refuse_with_distinct_error() -> anyhow::Result<()> {
	let w = world(FakeBrowser::new());
	let expired = w.login("expired-creds", "https://a.com", |l| l.status = LoginStatus::Expired).await;
	let id = agent(&w, vec![expired], Vec::new()).await;

	let err = w.runner.execute_agent(&id).await.unwrap_err();
	assert!(matches!(err, Error::InvalidLogins { ref logins } if logins == &vec!["expired-creds".to_string()]));
	Ok(())
}

#[tokio::test]
async fn valid_agent_runs_and_failures_are_recorded() -> anyhow::Result<()> {
	let w = world(FakeBrowser::new().missing_selector("#missing"));
	let ok = w.login("ok", "https://a.com", |l| l.status = LoginStatus::ReadyForAgents).await;

	let good = agent(
		&w,
		vec![ok.clone()],
		vec![
			AgentAction::Goto {
				url: "https://a.com/reports".into(),
			},
			AgentAction::Type {
				selector: "#user".into(),
				text: "{{login.username}}".into(),
			},
		],
	)
	.await;
	let run = w.runner.execute_agent(&good).await?;
	assert_eq!(run.status, RunStatus::Succeeded);
	assert!(run.finished_at.is_some());
	assert_eq!(w.fake.stats().fills, vec![("#user".to_string(), "alice".to_string())]);

	let bad = agent(&w, vec![ok], vec![AgentAction::Click { selector: "#missing".into() }]).await;
	let run = w.runner.execute_agent(&bad).await?;
	assert_eq!(run.status, RunStatus::Failed);
	assert!(run.error_message.unwrap_or_default().contains("#missing"));

	let history = w.runner.list_runs(&bad).await?;
	assert_eq!(history.len(), 1);
	assert_eq!(history[0].status, RunStatus::Failed);
	Ok(())
}

#[tokio::test]
async fn status_view_overrides_expired_active_without_writing() -> anyhow::Result<()> {
	let w = world(FakeBrowser::new());
	let stale = w
		.login("stale", "https://a.com", |l| {
			l.status = LoginStatus::Active;
			l.session_expiry = Some(Utc::now() - Duration::hours(2));
		})
		.await;
	let broken = w
		.login("broken", "https://b.com", |l| {
			l.status = LoginStatus::Broken;
			l.session_expiry = Some(Utc::now() - Duration::hours(2));
			l.failure_count = 3;
		})
		.await;
	let id = agent(&w, vec![stale.clone(), broken], Vec::new()).await;
	let before = w.store.snapshot();

	let view = w.runner.get_agent_login_status(&id).await?;

	assert_eq!(view[0].status, LoginStatus::Disconnected);
	assert_eq!(view[0].stored_status, LoginStatus::Active);
	assert!(view[0].session_expired);
	assert_eq!(view[1].status, LoginStatus::Broken);
	assert_eq!(view[1].failure_count, 3);

	let after = w.store.snapshot();
	assert_eq!(before.logins, after.logins);
	assert_eq!(w.stored(&stale).await.status, LoginStatus::Active);
	assert_eq!(w.fake.stats().launches, 0);
	Ok(())
}

#[tokio::test]
async fn unknown_agent_is_an_error() {
	let w = world(FakeBrowser::new());
	let missing = AgentId::from("nope");
	assert!(matches!(w.runner.execute_agent(&missing).await, Err(Error::AgentNotFound(_))));
	assert!(matches!(w.runner.validate_agent_logins(&missing).await, Err(Error::AgentNotFound(_))));
	assert!(w.store.list_runs(&missing).await.unwrap().is_empty());
}
