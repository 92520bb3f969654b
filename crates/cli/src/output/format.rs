use clap::ValueEnum;

/// How the result envelope is printed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Compact TOON (default)
	#[default]
	Toon,
	/// Pretty-printed JSON
	Json,
	/// Data as JSON, errors and diagnostics as plain lines
	Text,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		<Self as ValueEnum>::from_str(s, true).map_err(|_| format!("unknown format: {s}"))
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.to_possible_value() {
			Some(value) => f.write_str(value.get_name()),
			None => Ok(()),
		}
	}
}
