use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Environment variable that overrides the configured log filter.
pub const LOG_ENV: &str = "SOYSHELL_LOG";

/// Build the filter: `SOYSHELL_LOG` wins when set and valid, otherwise `default_level`.
pub fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install a stderr subscriber for diagnostics.
///
/// Calling this more than once is harmless; only the first call takes effect.
pub fn init(default_level: &str) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_filter(filter(default_level));

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        eprintln!("soyshell: warning: failed to initialize tracing");
    }
}
