use std::time::Instant;

use clap::Parser;
use tracing::error;
use warden_cli::cli::Cli;
use warden_cli::output::print_failure;
use warden_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let started = Instant::now();
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let name = cli.command.name();
	let format = cli.format;

	if let Err(err) = commands::dispatch(cli).await {
		error!(target = "warden", error = %err, "command failed");
		print_failure(&name, err.to_command_error(), started.elapsed().as_millis() as u64, format);
		std::process::exit(1);
	}
}
