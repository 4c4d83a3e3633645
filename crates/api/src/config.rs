use std::time::Duration;

use relay_core::campaign::DEFAULT_DELIVERY_TIMEOUT_SECS;
use relay_core::rate_limit::{DEFAULT_BURST, DEFAULT_RATE_PER_SEC};
use relay_core::retry::RetryPolicy;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development except
/// the two secrets, which must be provided.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Shared secret the channel provider signs webhook bodies with.
    pub webhook_secret: String,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Campaign dispatch budget and retry policy.
    pub dispatch: DispatchConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `WEBHOOK_SECRET`       | required                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let webhook_secret =
            std::env::var("WEBHOOK_SECRET").expect("WEBHOOK_SECRET must be set in the environment");
        assert!(!webhook_secret.is_empty(), "WEBHOOK_SECRET must not be empty");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            webhook_secret,
            jwt: JwtConfig::from_env(),
            dispatch: DispatchConfig::from_env(),
        }
    }
}

/// Per-campaign dispatch budget.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum concurrent outbound sends for one campaign.
    pub concurrency: usize,
    /// Token bucket refill rate, sends per second.
    pub rate_per_sec: f64,
    /// Token bucket capacity.
    pub burst: u32,
    /// Retry policy for transient channel failures.
    pub retry: RetryPolicy,
    /// Age after which a recipient stuck at `sent` stops holding its
    /// campaign in `sending`.
    pub delivery_timeout: chrono::Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            rate_per_sec: DEFAULT_RATE_PER_SEC,
            burst: DEFAULT_BURST,
            retry: RetryPolicy::default(),
            delivery_timeout: chrono::Duration::seconds(DEFAULT_DELIVERY_TIMEOUT_SECS),
        }
    }
}

impl DispatchConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `DISPATCH_CONCURRENCY`     | `10`    |
    /// | `DISPATCH_RATE_PER_SEC`    | `20`    |
    /// | `DISPATCH_BURST`           | `20`    |
    /// | `DISPATCH_MAX_ATTEMPTS`    | `3`     |
    /// | `DISPATCH_BACKOFF_BASE_MS` | `500`   |
    /// | `DISPATCH_BACKOFF_MAX_MS`  | `8000`  |
    /// | `DELIVERY_TIMEOUT_SECS`    | `900`   |
    pub fn from_env() -> Self {
        let concurrency: usize = env_or("DISPATCH_CONCURRENCY", "10")
            .parse()
            .expect("DISPATCH_CONCURRENCY must be a valid usize");
        assert!(concurrency > 0, "DISPATCH_CONCURRENCY must be at least 1");

        let rate_per_sec = parse_rate_per_sec(&env_or("DISPATCH_RATE_PER_SEC", "20"));

        let burst: u32 = env_or("DISPATCH_BURST", "20")
            .parse()
            .expect("DISPATCH_BURST must be a valid u32");

        let max_attempts: u32 = env_or("DISPATCH_MAX_ATTEMPTS", "3")
            .parse()
            .expect("DISPATCH_MAX_ATTEMPTS must be a valid u32");

        let base_ms: u64 = env_or("DISPATCH_BACKOFF_BASE_MS", "500")
            .parse()
            .expect("DISPATCH_BACKOFF_BASE_MS must be a valid u64");

        let max_ms: u64 = env_or("DISPATCH_BACKOFF_MAX_MS", "8000")
            .parse()
            .expect("DISPATCH_BACKOFF_MAX_MS must be a valid u64");

        let delivery_timeout_secs: i64 = env_or("DELIVERY_TIMEOUT_SECS", "900")
            .parse()
            .expect("DELIVERY_TIMEOUT_SECS must be a valid i64");

        Self {
            concurrency,
            rate_per_sec,
            burst,
            retry: RetryPolicy {
                max_attempts: max_attempts.max(1),
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(max_ms),
            },
            delivery_timeout: chrono::Duration::seconds(delivery_timeout_secs),
        }
    }
}

/// Parse `DISPATCH_RATE_PER_SEC`. `0` disables limiting; NaN and infinity
/// are rejected at startup.
fn parse_rate_per_sec(raw: &str) -> f64 {
    let rate: f64 = raw
        .trim()
        .parse()
        .expect("DISPATCH_RATE_PER_SEC must be a number");
    assert!(
        rate.is_finite() && rate >= 0.0,
        "DISPATCH_RATE_PER_SEC must be a finite, non-negative number"
    );
    rate
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_accepts_plain_numbers() {
        assert_eq!(parse_rate_per_sec("20"), 20.0);
        assert_eq!(parse_rate_per_sec(" 2.5 "), 2.5);
        assert_eq!(parse_rate_per_sec("0"), 0.0);
    }

    #[test]
    #[should_panic(expected = "finite")]
    fn rate_rejects_nan() {
        parse_rate_per_sec("NaN");
    }

    #[test]
    #[should_panic(expected = "finite")]
    fn rate_rejects_infinity() {
        parse_rate_per_sec("inf");
    }

    #[test]
    #[should_panic(expected = "finite")]
    fn rate_rejects_negative() {
        parse_rate_per_sec("-1");
    }
}
