use warden::NewAgent;
use warden_protocol::{AgentId, LoginId, RunStatus};

use super::{CommandOutput, read_json};
use crate::cli::{AgentAction, AgentAddArgs};
use crate::context::CommandContext;
use crate::error::Result;
use crate::output::DeletedData;

pub async fn execute(ctx: &CommandContext, action: AgentAction) -> Result<CommandOutput> {
	match action {
		AgentAction::Add(args) => add(ctx, args).await,
		AgentAction::List => CommandOutput::new(ctx.store.list_agents().await?),
		AgentAction::Validate { id } => CommandOutput::new(ctx.runner().validate_agent_logins(&AgentId::from(id)).await?),
		AgentAction::Status { id } => CommandOutput::new(ctx.runner().get_agent_login_status(&AgentId::from(id)).await?),
		AgentAction::Run { id } => {
			let run = ctx.runner().execute_agent(&AgentId::from(id)).await?;
			let output = CommandOutput::new(&run)?;
			Ok(match (run.status, &run.error_message) {
				(RunStatus::Failed, Some(message)) => output.warning(format!("Agent run failed: {message}")),
				_ => output,
			})
		}
		AgentAction::Runs { id } => CommandOutput::new(ctx.runner().list_runs(&AgentId::from(id)).await?),
		AgentAction::Delete { id } => {
			ctx.catalog().delete_agent(&AgentId::from(id.as_str())).await?;
			CommandOutput::new(DeletedData { deleted: id })
		}
	}
}

async fn add(ctx: &CommandContext, args: AgentAddArgs) -> Result<CommandOutput> {
	let actions = match args.actions.as_deref() {
		Some(path) => read_json(path)?,
		None => Vec::new(),
	};
	let agent = ctx
		.catalog()
		.create_agent(NewAgent {
			user_id: args.user,
			name: args.name,
			logins: args.logins.into_iter().map(LoginId::from).collect(),
			actions,
		})
		.await?;
	CommandOutput::new(agent)
}
