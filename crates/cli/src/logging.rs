use tracing_subscriber::EnvFilter;

/// Default filter directive for a `-v` count.
pub fn default_directive(verbose: u8) -> &'static str {
	match verbose {
		0 => "warn",
		1 => "warn,warden=info",
		2 => "info,warden=debug",
		_ => "debug,warden=trace",
	}
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `-v` when set.
///
/// Stdout is reserved for the result envelope.
pub fn init_logging(verbose: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(verbose > 1)
		.try_init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_raises_warden_level() {
		assert_eq!(default_directive(0), "warn");
		assert!(default_directive(1).contains("warden=info"));
		assert!(default_directive(2).contains("warden=debug"));
		assert_eq!(default_directive(9), default_directive(3));
	}
}
