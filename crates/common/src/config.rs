use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Environment-sourced configuration, read once at startup and passed into
/// component constructors.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of worker actors per pipeline (`WORKER_COUNT`)
    pub worker_count: usize,
    /// Concurrent job slots per execute worker (`WORKER_CONCURRENCY`)
    pub execute_concurrency: usize,
    /// Concurrent job slots per classify worker (`CLASSIFY_CONCURRENCY`)
    pub classify_concurrency: usize,
    /// Trigger scan interval (`TRIGGER_INTERVAL`, milliseconds)
    pub trigger_interval: Duration,
    /// Max age before a retryable signal is forced terminal (`RETRY_WINDOW_HOURS`)
    pub retry_window: Duration,
    /// Health endpoint port (`HEALTH_PORT`)
    pub health_port: u16,
    /// Wait budget for wallet-level lock acquisition
    pub wallet_lock_wait: Duration,
    /// Lease TTL for the wallet-level lock
    pub wallet_lock_ttl: Duration,
    /// Lease TTL for the signal-level lock (immediate-fail acquisition)
    pub signal_lock_ttl: Duration,
    /// Lease TTL for the message-level lock (immediate-fail acquisition)
    pub message_lock_ttl: Duration,
    pub venue_api_url: String,
    pub classifier_api_url: String,
    pub classifier_api_key: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            worker_count: env_or("WORKER_COUNT", 3),
            execute_concurrency: env_or("WORKER_CONCURRENCY", 5),
            classify_concurrency: env_or("CLASSIFY_CONCURRENCY", 10),
            trigger_interval: Duration::from_millis(env_or("TRIGGER_INTERVAL", 15_000)),
            retry_window: Duration::from_secs(env_or("RETRY_WINDOW_HOURS", 24u64) * 3600),
            health_port: env_or("HEALTH_PORT", 8080),
            wallet_lock_wait: Duration::from_secs(env_or("WALLET_LOCK_WAIT_SECS", 300)),
            wallet_lock_ttl: Duration::from_secs(env_or("WALLET_LOCK_TTL_SECS", 180)),
            signal_lock_ttl: Duration::from_secs(env_or("SIGNAL_LOCK_TTL_SECS", 120)),
            message_lock_ttl: Duration::from_secs(env_or("MESSAGE_LOCK_TTL_SECS", 120)),
            venue_api_url: env::var("VENUE_API_URL")
                .unwrap_or_else(|_| "http://localhost:9100".to_string()),
            classifier_api_url: env::var("CLASSIFIER_API_URL")
                .unwrap_or_else(|_| "http://localhost:9200".to_string()),
            classifier_api_key: env::var("CLASSIFIER_API_KEY").unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: 3,
            execute_concurrency: 5,
            classify_concurrency: 10,
            trigger_interval: Duration::from_millis(15_000),
            retry_window: Duration::from_secs(24 * 3600),
            health_port: 8080,
            wallet_lock_wait: Duration::from_secs(300),
            wallet_lock_ttl: Duration::from_secs(180),
            signal_lock_ttl: Duration::from_secs(120),
            message_lock_ttl: Duration::from_secs(120),
            venue_api_url: "http://localhost:9100".to_string(),
            classifier_api_url: "http://localhost:9200".to_string(),
            classifier_api_key: String::new(),
        }
    }
}
