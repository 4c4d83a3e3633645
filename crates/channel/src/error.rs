//! Provider failure taxonomy.

/// Provider error codes that mean "try again later" even when the HTTP
/// status is a 4xx.
const TRANSIENT_PROVIDER_CODES: &[i64] = &[
    1,      // API unknown
    2,      // API service temporarily unavailable
    4,      // application request limit
    80007,  // business account rate limit
    130429, // throughput rate limit
    131000, // something went wrong
    131016, // service unavailable
    131056, // pair rate limit
];

/// Why a send did not produce a provider message id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelSendError {
    /// Rate limits, provider 5xx, network failures. Eligible for retry.
    #[error("Transient channel error: {message}")]
    Transient { message: String, code: Option<i64> },

    /// Invalid recipient, unknown template, rejected payload. Never retried.
    #[error("Permanent channel error: {message}")]
    Permanent { message: String, code: Option<i64> },
}

impl ChannelSendError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            code: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
            code: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. } | Self::Permanent { message, .. } => message,
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Transient { code, .. } | Self::Permanent { code, .. } => *code,
        }
    }

    /// Text recorded on a recipient that failed with this error.
    pub fn recipient_annotation(&self) -> String {
        match self.code() {
            Some(code) => format!("{code}: {}", self.message()),
            None => self.message().to_string(),
        }
    }

    /// Classify a non-success provider response.
    ///
    /// 429 and 5xx are transient. Other statuses are permanent unless the
    /// provider's own error code is a known throttling or availability code.
    pub fn from_response(status: u16, provider_code: Option<i64>, message: String) -> Self {
        let transient = status == 429
            || (500..600).contains(&status)
            || provider_code.is_some_and(|c| TRANSIENT_PROVIDER_CODES.contains(&c));
        if transient {
            Self::Transient {
                message,
                code: provider_code,
            }
        } else {
            Self::Permanent {
                message,
                code: provider_code,
            }
        }
    }
}

impl From<reqwest::Error> for ChannelSendError {
    /// Anything that failed before a response arrived is transient, except
    /// a request that could not even be built.
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::permanent(format!("invalid request: {err}"))
        } else {
            Self::transient(format!("request failed: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(ChannelSendError::from_response(429, None, "slow down".into()).is_transient());
        assert!(ChannelSendError::from_response(503, None, "unavailable".into()).is_transient());
        assert!(ChannelSendError::from_response(400, Some(130429), "throughput".into()).is_transient());
    }

    #[test]
    fn validation_failures_are_permanent() {
        for (status, code) in [(400, Some(131026)), (400, Some(132001)), (404, None), (401, Some(190))] {
            assert!(
                !ChannelSendError::from_response(status, code, "no".into()).is_transient(),
                "{status} {code:?} should be permanent"
            );
        }
    }

    #[test]
    fn annotation_includes_provider_code() {
        let err = ChannelSendError::from_response(400, Some(131026), "Message undeliverable".into());
        assert_eq!(err.recipient_annotation(), "131026: Message undeliverable");
        assert_eq!(ChannelSendError::permanent("bad").recipient_annotation(), "bad");
    }
}
