use tracing_subscriber::fmt::layer;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with structured JSON output
pub fn init_tracing() {
    Registry::default()
        .with(env_filter())
        .with(layer().json())
        .init();
}

/// Initialize tracing with pretty output for development
pub fn init_tracing_pretty() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Pick the output format from a `LOG_FORMAT` style value
pub fn init_tracing_for(format: &str) {
    if format.eq_ignore_ascii_case("json") {
        init_tracing();
    } else {
        init_tracing_pretty();
    }
}
