use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_FILTER: &str = "info";

/// Installs the global fmt subscriber, writing to stderr.
///
/// The filter is read from `var`, then `RUST_LOG`, and falls back to `info`
/// when neither is set or the value does not parse.
pub fn init_logging(var: &str) {
    let filter = std::env::var(var)
        .or_else(|_| std::env::var("RUST_LOG"))
        .map_or_else(
            |_| EnvFilter::new(DEFAULT_FILTER),
            |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        );

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {err}");
    }
}
