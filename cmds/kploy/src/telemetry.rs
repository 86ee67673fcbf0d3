//! Logging setup.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize tracing on stderr.
///
/// Priority for log level:
/// 1. `--verbose` selects debug
/// 2. `RUST_LOG` environment variable
/// 3. Default: info
///
/// Output format:
/// - Pretty format if stderr is a terminal
/// - JSON format otherwise
pub fn init(verbose: bool) {
	let filter_layer = if verbose {
		EnvFilter::new(Level::DEBUG.as_str())
	} else {
		EnvFilter::builder()
			.with_default_directive(Level::INFO.into())
			.from_env_lossy()
	};

	let fmt_layer = if std::io::stderr().is_terminal() {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.pretty()
			.boxed()
	} else {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.json()
			.boxed()
	};

	tracing_subscriber::registry()
		.with(filter_layer)
		.with(fmt_layer)
		.init();
}
