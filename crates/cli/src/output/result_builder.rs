use std::io::{self, Write};
use std::time::Instant;

use serde::Serialize;

use crate::output::format::OutputFormat;
use crate::output::model::{CommandError, CommandResult, Diagnostic, DiagnosticLevel, ErrorCode};

/// Builder for constructing command results.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Option<Instant>,
	duration_ms: Option<u64>,
	diagnostics: Vec<Diagnostic>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Some(Instant::now()),
			duration_ms: None,
			diagnostics: Vec::new(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn diagnostic(mut self, level: DiagnosticLevel, message: impl Into<String>) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
		});
		self
	}

	pub fn diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
		self.diagnostics.extend(diagnostics);
		self
	}

	/// Overrides the measured duration, e.g. when timing started before the builder.
	pub fn duration_ms(mut self, duration_ms: u64) -> Self {
		self.duration_ms = Some(duration_ms);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();
		let duration_ms = self.duration_ms.or_else(|| self.start_time.map(|start| start.elapsed().as_millis() as u64));

		CommandResult {
			ok,
			command: self.command,
			data: self.data,
			error: self.error,
			duration_ms,
			diagnostics: self.diagnostics,
		}
	}
}

/// Renders a command result in the requested format.
pub fn render_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) -> String {
	match format {
		OutputFormat::Toon => serde_json::to_value(result)
			.map(|value| toon::encode(&value, None))
			.unwrap_or_default(),
		OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
		OutputFormat::Text => render_result_text(result),
	}
}

/// Print a command result to stdout in the specified format.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	let rendered = render_result(result, format);
	let mut stdout = io::stdout().lock();
	let _ = writeln!(stdout, "{}", rendered.trim_end());
}

fn render_result_text<T: Serialize>(result: &CommandResult<T>) -> String {
	let mut out = String::new();

	if result.ok {
		if let Some(ref data) = result.data {
			if let Ok(json) = serde_json::to_string_pretty(data) {
				out.push_str(&json);
				out.push('\n');
			}
		}
	} else if let Some(ref error) = result.error {
		out.push_str(&format!("Error [{}]: {}\n", error.code, error.message));
		if let Some(ref details) = error.details {
			if let Ok(json) = serde_json::to_string_pretty(details) {
				out.push_str(&format!("Details: {json}\n"));
			}
		}
	}

	for diag in &result.diagnostics {
		let prefix = match diag.level {
			DiagnosticLevel::Info => "info",
			DiagnosticLevel::Warning => "warning",
		};
		out.push_str(&format!("[{prefix}] {}\n", diag.message));
	}

	if let Some(duration_ms) = result.duration_ms {
		out.push_str(&format!("Completed in {duration_ms}ms\n"));
	}
	out
}

/// Prints a failed command envelope to stdout.
pub fn print_failure(command: &str, error: CommandError, duration_ms: u64, format: OutputFormat) {
	let result: CommandResult<()> = ResultBuilder::new(command).error(error).duration_ms(duration_ms).build();
	print_result(&result, format);
}

/// Shorthand used by tests and callers that only have a code and message.
pub fn command_error(code: ErrorCode, message: impl Into<String>) -> CommandError {
	CommandError {
		code,
		message: message.into(),
		details: None,
	}
}
