//! Tracing setup shared by every binary.

use tracing_subscriber::EnvFilter;

/// Map the configured log level (`DEBUG`..`CRITICAL`) to a tracing directive.
fn level_directive(level: &str) -> &'static str {
    match level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise the configured level is
/// applied with noisy third-party targets quieted. Safe to call more than
/// once (subsequent calls are no-ops), which keeps tests simple.
pub fn init_tracing(level: &str) {
    let directive = level_directive(level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{directive},hyper=warn,h2=warn,reqwest=warn,sqlx=warn,tower_http=info"
        ))
    });
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
