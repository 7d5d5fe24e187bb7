use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "dashwallet=info,chain_dash=info,wallet_core=info";

/// Log to stderr so stdout carries only reports and JSON.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
