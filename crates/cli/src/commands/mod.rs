mod agent;
mod login;

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cli::{Cli, Commands};
use crate::context::CommandContext;
use crate::error::{CliError, Result};
use crate::output::{Diagnostic, DiagnosticLevel, ResultBuilder, print_result};

/// Payload and diagnostics produced by one command.
#[derive(Debug)]
pub struct CommandOutput {
	pub data: Value,
	pub diagnostics: Vec<Diagnostic>,
}

impl CommandOutput {
	pub fn new(data: impl Serialize) -> Result<Self> {
		Ok(Self {
			data: serde_json::to_value(data)?,
			diagnostics: Vec::new(),
		})
	}

	pub fn warning(mut self, message: impl Into<String>) -> Self {
		self.diagnostics.push(Diagnostic {
			level: DiagnosticLevel::Warning,
			message: message.into(),
		});
		self
	}
}

/// Executes one command against an already built context.
pub async fn execute(ctx: &CommandContext, command: Commands) -> Result<CommandOutput> {
	match command {
		Commands::Login { action } => login::execute(ctx, action).await,
		Commands::Agent { action } => agent::execute(ctx, action).await,
	}
}

/// Builds the context, runs the command and prints its envelope.
pub async fn dispatch(cli: Cli) -> Result<()> {
	let ctx = CommandContext::from_cli(&cli)?;
	let name = cli.command.name();

	let outcome = execute(&ctx, cli.command).await;
	ctx.shutdown().await;
	let output = outcome?;

	let result = ResultBuilder::new(name)
		.data(output.data)
		.diagnostics(output.diagnostics)
		.duration_ms(ctx.elapsed_ms())
		.build();
	print_result(&result, ctx.format);
	Ok(())
}

/// Reads and decodes a JSON file given on the command line.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
	let content = std::fs::read_to_string(path).map_err(|e| CliError::InvalidInput(format!("{}: {e}", path.display())))?;
	serde_json::from_str(&content).map_err(|e| CliError::InvalidInput(format!("{}: {e}", path.display())))
}

/// Reads a secret from the environment variable named on the command line.
fn secret_from_env(var: Option<&str>) -> Result<Option<String>> {
	let Some(var) = var else {
		return Ok(None);
	};
	match std::env::var(var) {
		Ok(value) if !value.is_empty() => Ok(Some(value)),
		_ => Err(CliError::InvalidInput(format!("environment variable {var} is not set"))),
	}
}
