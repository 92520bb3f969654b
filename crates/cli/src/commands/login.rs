use std::time::Duration;

use warden::{CredentialUpdate, NewLogin};
use warden_protocol::{Login, LoginId, SessionSnapshot};
use warden_runtime::ContextLease;

use super::{CommandOutput, read_json, secret_from_env};
use crate::cli::{LoginAction, LoginAddArgs, LoginUpdateArgs, ReconnectArgs};
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{DeletedData, LoginSummary};

pub async fn execute(ctx: &CommandContext, action: LoginAction) -> Result<CommandOutput> {
	match action {
		LoginAction::Add(args) => add(ctx, args).await,
		LoginAction::List => {
			let logins = ctx.store.list_logins().await?;
			CommandOutput::new(logins.iter().map(LoginSummary::from).collect::<Vec<_>>())
		}
		LoginAction::Show { id } => CommandOutput::new(LoginSummary::from(&find(ctx, &LoginId::from(id)).await?)),
		LoginAction::Update(args) => update(ctx, args).await,
		LoginAction::Check { id } => {
			let result = ctx.checker().check_login_health(&LoginId::from(id)).await?;
			let output = CommandOutput::new(&result)?;
			Ok(if result.needs_reconnect() {
				output.warning("Run `warden login reconnect` to capture a fresh session")
			} else {
				output
			})
		}
		LoginAction::CheckAll => CommandOutput::new(ctx.checker().check_all_logins().await?),
		LoginAction::Reconnect(args) => reconnect(ctx, args).await,
		LoginAction::ClearSession { id } => {
			let login = ctx.catalog().clear_session(&LoginId::from(id)).await?;
			CommandOutput::new(LoginSummary::from(&login))
		}
		LoginAction::Delete { id } => {
			ctx.catalog().delete_login(&LoginId::from(id.as_str())).await?;
			CommandOutput::new(DeletedData { deleted: id })
		}
	}
}

async fn find(ctx: &CommandContext, id: &LoginId) -> Result<Login> {
	Ok(ctx.store.get_login(id).await?.ok_or_else(|| warden::Error::LoginNotFound(id.clone()))?)
}

async fn add(ctx: &CommandContext, args: LoginAddArgs) -> Result<CommandOutput> {
	let custom_config = args.script.as_deref().map(read_json::<serde_json::Value>).transpose()?;
	let login = ctx
		.catalog()
		.create_login(NewLogin {
			user_id: args.user,
			name: args.name,
			site_url: args.site,
			login_url: args.login_url,
			username: args.username,
			password: secret_from_env(args.password_env.as_deref())?,
			oauth_token: secret_from_env(args.oauth_token_env.as_deref())?,
			template_id: args.template,
			custom_config,
		})
		.await?;
	CommandOutput::new(LoginSummary::from(&login))
}

async fn update(ctx: &CommandContext, args: LoginUpdateArgs) -> Result<CommandOutput> {
	let custom_config = args.script.as_deref().map(read_json::<serde_json::Value>).transpose()?;
	let login = ctx
		.catalog()
		.update_credentials(
			&LoginId::from(args.id),
			CredentialUpdate {
				username: args.username,
				password: secret_from_env(args.password_env.as_deref())?,
				oauth_token: secret_from_env(args.oauth_token_env.as_deref())?,
				login_url: args.login_url,
				template_id: args.template,
				custom_config,
			},
		)
		.await?;
	CommandOutput::new(LoginSummary::from(&login))
}

/// Lets the user sign in by hand, then stores the captured session.
async fn reconnect(ctx: &CommandContext, args: ReconnectArgs) -> Result<CommandOutput> {
	let id = LoginId::from(args.id.as_str());
	let login = find(ctx, &id).await?;
	let url = login.login_url.clone().unwrap_or_else(|| login.site_url.clone());

	let lease = ctx.pool.acquire().await?;
	let captured = capture_after_sign_in(ctx, &lease, &url, &args).await;
	lease.release().await;
	let (snapshot, timed_out) = captured?;

	let login = ctx.catalog().store_session(&id, &snapshot).await?;

	let output = CommandOutput::new(LoginSummary::from(&login))?;
	Ok(if timed_out {
		output.warning("No confirmation before the timeout; captured the session as it was")
	} else {
		output
	})
}

async fn capture_after_sign_in(ctx: &CommandContext, lease: &ContextLease, url: &str, args: &ReconnectArgs) -> Result<(SessionSnapshot, bool)> {
	lease.page().goto(url, ctx.config.navigation_timeout_ms).await?;

	let mut timed_out = false;
	if !args.no_wait {
		eprintln!("Browser opened at: {url}");
		eprintln!("Sign in, then press Enter to capture the session.");
		eprintln!("(Or wait {} seconds for automatic capture)", args.timeout);

		let enter = tokio::task::spawn_blocking(|| {
			let mut input = String::new();
			std::io::stdin().read_line(&mut input).ok();
		});
		tokio::select! {
			_ = enter => {}
			_ = tokio::time::sleep(Duration::from_secs(args.timeout)) => timed_out = true,
		}
	}

	let snapshot = ctx.sessions.capture_snapshot(lease.context(), lease.page()).await?;
	Ok((snapshot, timed_out))
}
