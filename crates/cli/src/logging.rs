use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter directive for a `-v` count.
///
/// 0 keeps only errors, 1 adds session lifecycle, 2+ includes protocol
/// traffic and interpreter stderr.
pub fn filter_for(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "error,nbexec_runtime=warn,nbexec_cli=warn",
		1 => "info",
		_ => "debug",
	}
}

pub fn init_logging(verbosity: u8) {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

	// stdout carries block output; logs always go to stderr.
	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_filters_parse() {
		for verbosity in 0..=3 {
			assert!(EnvFilter::try_new(filter_for(verbosity)).is_ok());
		}
	}

	#[test]
	fn test_verbosity_escalates() {
		assert!(filter_for(0).starts_with("error"));
		assert_eq!(filter_for(1), "info");
		assert_eq!(filter_for(5), "debug");
	}
}
