use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Login health checks, session reconnects and agent login gating")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Toon)]
	pub format: OutputFormat,

	/// JSON store file (overrides WARDEN_STORE)
	#[arg(long, global = true, value_name = "PATH")]
	pub store: Option<PathBuf>,

	/// DevTools endpoint of the browser to drive (overrides WARDEN_CDP_ENDPOINT)
	#[arg(long = "cdp", global = true, value_name = "URL")]
	pub cdp_endpoint: Option<String>,

	/// Configuration file (defaults to config.json in the warden config dir)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Manage logins and check their health
	Login {
		#[command(subcommand)]
		action: LoginAction,
	},

	/// Manage agents and run them behind the login gate
	Agent {
		#[command(subcommand)]
		action: AgentAction,
	},
}

impl Commands {
	/// Command name used in the result envelope, e.g. `login check`.
	pub fn name(&self) -> String {
		match self {
			Commands::Login { action } => format!("login {}", action.name()),
			Commands::Agent { action } => format!("agent {}", action.name()),
		}
	}
}

#[derive(Subcommand, Debug)]
pub enum LoginAction {
	/// Store a new login (credentials are encrypted before they are saved)
	Add(LoginAddArgs),

	/// List stored logins
	#[command(alias = "ls")]
	List,

	/// Show one login
	Show { id: String },

	/// Change credentials or script; the login goes back to NEEDS_TESTING
	Update(LoginUpdateArgs),

	/// Run a live health check for one login
	Check { id: String },

	/// Check every login, one after another
	CheckAll,

	/// Open the login page in the browser, let the user sign in, then capture the session
	Reconnect(ReconnectArgs),

	/// Drop the captured session of a login
	ClearSession { id: String },

	/// Delete a login that no agent uses
	#[command(alias = "rm")]
	Delete { id: String },
}

impl LoginAction {
	pub fn name(&self) -> &'static str {
		match self {
			LoginAction::Add(_) => "add",
			LoginAction::List => "list",
			LoginAction::Show { .. } => "show",
			LoginAction::Update(_) => "update",
			LoginAction::Check { .. } => "check",
			LoginAction::CheckAll => "check-all",
			LoginAction::Reconnect(_) => "reconnect",
			LoginAction::ClearSession { .. } => "clear-session",
			LoginAction::Delete { .. } => "delete",
		}
	}
}

#[derive(Args, Debug)]
pub struct LoginAddArgs {
	/// Display name
	#[arg(long)]
	pub name: String,

	/// Site root, e.g. https://github.com
	#[arg(long)]
	pub site: String,

	/// Login page, when it differs from the site root
	#[arg(long)]
	pub login_url: Option<String>,

	#[arg(long)]
	pub username: String,

	/// Environment variable holding the password
	#[arg(long, value_name = "VAR")]
	pub password_env: Option<String>,

	/// Environment variable holding an OAuth token
	#[arg(long, value_name = "VAR")]
	pub oauth_token_env: Option<String>,

	/// Built-in login template (github, gitlab, wordpress, generic)
	#[arg(long)]
	pub template: Option<String>,

	/// JSON file with a custom login script
	#[arg(long, value_name = "FILE")]
	pub script: Option<PathBuf>,

	/// Owner of the login
	#[arg(long, default_value = "local")]
	pub user: String,
}

#[derive(Args, Debug)]
pub struct LoginUpdateArgs {
	pub id: String,

	#[arg(long)]
	pub username: Option<String>,

	#[arg(long, value_name = "VAR")]
	pub password_env: Option<String>,

	#[arg(long, value_name = "VAR")]
	pub oauth_token_env: Option<String>,

	#[arg(long)]
	pub login_url: Option<String>,

	#[arg(long)]
	pub template: Option<String>,

	#[arg(long, value_name = "FILE")]
	pub script: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReconnectArgs {
	pub id: String,

	/// Seconds to wait for Enter before capturing anyway
	#[arg(long, default_value_t = 300)]
	pub timeout: u64,

	/// Capture right after the page loads (for profiles that are already signed in)
	#[arg(long)]
	pub no_wait: bool,
}

#[derive(Subcommand, Debug)]
pub enum AgentAction {
	/// Create an agent
	Add(AgentAddArgs),

	/// List agents
	#[command(alias = "ls")]
	List,

	/// Validate the agent's logins without running it
	Validate { id: String },

	/// Read-only status of the agent's logins
	Status { id: String },

	/// Run the agent if all of its logins are usable
	Run { id: String },

	/// Run history of an agent
	Runs { id: String },

	/// Delete an agent and its run history
	#[command(alias = "rm")]
	Delete { id: String },
}

impl AgentAction {
	pub fn name(&self) -> &'static str {
		match self {
			AgentAction::Add(_) => "add",
			AgentAction::List => "list",
			AgentAction::Validate { .. } => "validate",
			AgentAction::Status { .. } => "status",
			AgentAction::Run { .. } => "run",
			AgentAction::Runs { .. } => "runs",
			AgentAction::Delete { .. } => "delete",
		}
	}
}

#[derive(Args, Debug)]
pub struct AgentAddArgs {
	#[arg(long)]
	pub name: String,

	/// Attached login id, in order (repeatable)
	#[arg(long = "login", value_name = "ID")]
	pub logins: Vec<String>,

	/// JSON file with the agent's actions
	#[arg(long, value_name = "FILE")]
	pub actions: Option<PathBuf>,

	#[arg(long, default_value = "local")]
	pub user: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_global_flags_after_subcommand() {
		let cli = Cli::try_parse_from(["warden", "login", "check", "abc", "-vv", "-f", "json", "--store", "/tmp/s.json"]).unwrap();
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.format, OutputFormat::Json);
		assert_eq!(cli.store, Some(PathBuf::from("/tmp/s.json")));
		assert_eq!(cli.command.name(), "login check");
	}

	#[test]
	fn agent_logins_keep_their_order() {
		let cli = Cli::try_parse_from(["warden", "agent", "add", "--name", "export", "--login", "b", "--login", "a"]).unwrap();
		match cli.command {
			Commands::Agent {
				action: AgentAction::Add(args),
			} => assert_eq!(args.logins, vec!["b", "a"]),
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn command_names_match_the_cli_spelling() {
		let cli = Cli::try_parse_from(["warden", "login", "check-all"]).unwrap();
		assert_eq!(cli.command.name(), "login check-all");
		let cli = Cli::try_parse_from(["warden", "agent", "runs", "x"]).unwrap();
		assert_eq!(cli.command.name(), "agent runs");
		let cli = Cli::try_parse_from(["warden", "login", "reconnect", "x", "--no-wait"]).unwrap();
		assert_eq!(cli.command.name(), "login reconnect");
	}

	#[test]
	fn defaults() {
		let cli = Cli::try_parse_from(["warden", "login", "list"]).unwrap();
		assert_eq!(cli.format, OutputFormat::Toon);
		assert_eq!(cli.verbose, 0);
		assert!(cli.cdp_endpoint.is_none());
	}
}
