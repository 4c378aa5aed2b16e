use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes `tracing` logging with the filter read from the environment
/// variable `env`. If the variable is unset or invalid, the maximum log level
/// is INFO.
///
/// Logs are written to stderr, stdout is reserved for command output.
pub fn initialize_logging(env: &str) {
    let filter = EnvFilter::try_from_env(env)
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.to_string()));

    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry().with(filter).with(fmt).init();
}
