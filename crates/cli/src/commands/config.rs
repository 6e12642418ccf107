//! Show the effective configuration.

use clubhub_client::ClientConfig;
use tracing::info;

/// Log the loaded configuration with secrets redacted.
pub fn show(config: &ClientConfig) {
    let policy = config.role_retry_policy();
    let delays: Vec<u128> = config
        .role_retry_delays
        .iter()
        .map(std::time::Duration::as_millis)
        .collect();

    info!(
        backend_url = %config.backend.url,
        timeout_secs = config.backend.timeout.as_secs(),
        role_lookup_attempts = policy.max_attempts(),
        role_lookup_max_wait_ms = policy.total_delay().as_millis(),
        role_retry_delays_ms = ?delays,
        sentry = config.sentry_dsn.is_some(),
        sentry_environment = config.sentry_environment.as_deref().unwrap_or("-"),
        "Configuration loaded"
    );
}
