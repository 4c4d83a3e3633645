use std::time::Duration;

/// Outbound channel configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Provider base URL, without a trailing slash.
    pub api_base_url: String,
    /// Provider API version path segment, e.g. `v19.0`.
    pub api_version: String,
    /// Per-request timeout for outbound calls.
    pub request_timeout: Duration,
    /// Language code sent with template messages.
    pub template_language: String,
}

impl ChannelConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                      |
    /// |--------------------------------|------------------------------|
    /// | `CHANNEL_API_BASE_URL`         | `https://graph.facebook.com` |
    /// | `CHANNEL_API_VERSION`          | `v19.0`                      |
    /// | `CHANNEL_REQUEST_TIMEOUT_SECS` | `15`                         |
    /// | `CHANNEL_TEMPLATE_LANGUAGE`    | `es_MX`                      |
    pub fn from_env() -> Self {
        let api_base_url = std::env::var("CHANNEL_API_BASE_URL")
            .unwrap_or_else(|_| "https://graph.facebook.com".into())
            .trim_end_matches('/')
            .to_string();

        let api_version =
            std::env::var("CHANNEL_API_VERSION").unwrap_or_else(|_| "v19.0".into());

        let request_timeout_secs: u64 = std::env::var("CHANNEL_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".into())
            .parse()
            .expect("CHANNEL_REQUEST_TIMEOUT_SECS must be a valid u64");

        let template_language =
            std::env::var("CHANNEL_TEMPLATE_LANGUAGE").unwrap_or_else(|_| "es_MX".into());

        Self {
            api_base_url,
            api_version,
            request_timeout: Duration::from_secs(request_timeout_secs),
            template_language,
        }
    }

    /// Configuration pointing at an arbitrary base URL.
    pub fn for_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            api_version: "v19.0".into(),
            request_timeout: Duration::from_secs(15),
            template_language: "es_MX".into(),
        }
    }
}
