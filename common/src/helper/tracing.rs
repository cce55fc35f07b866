use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "BRIDGE_LOG";
const DEFAULT_LOG_LEVEL: &str = "info";

// Init tracing in level specified with env 'BRIDGE_LOG' or "info" level by default
pub fn init_default_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    // A subscriber may already be installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
