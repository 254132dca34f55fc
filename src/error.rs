//! Error taxonomy for brokerage calls and rebalancing runs.

use thiserror::Error;

/// Failure while talking to the brokerage API.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("authentication rejected by brokerage")]
    Auth,

    #[error("rate limited by brokerage")]
    RateLimited,

    #[error("brokerage API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode brokerage response: {0}")]
    Decode(String),
}

impl BrokerError {
    /// Whether a request that failed this way is worth re-sending.
    ///
    /// Timeouts, connection failures, rate limits, and 5xx responses are
    /// transient; auth rejections and other 4xx responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            BrokerError::RateLimited => true,
            BrokerError::Api { status, .. } => *status >= 500,
            BrokerError::Http(e) => e.is_timeout() || e.is_connect(),
            BrokerError::Auth | BrokerError::Decode(_) => false,
        }
    }
}

/// Failure of a rebalancing run, mapped to a process exit code.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("{failed} of {attempted} orders failed to submit")]
    PartialSubmission { attempted: usize, failed: usize },

    #[error("open orders did not settle within {timeout_secs}s")]
    SettlementTimeout { timeout_secs: u64 },

    #[error("failed to write run log: {0}")]
    RunLog(#[from] std::io::Error),
}

impl RunError {
    /// Exit code contract: 0 success, 1 unhandled, 2 auth, 3 partial
    /// submission, 4 settlement timeout.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Broker(BrokerError::Auth) => 2,
            RunError::PartialSubmission { .. } => 3,
            RunError::SettlementTimeout { .. } => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(BrokerError::RateLimited.is_retryable());
        assert!(BrokerError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!BrokerError::Auth.is_retryable());
        assert!(!BrokerError::Api {
            status: 422,
            message: "bad order".into()
        }
        .is_retryable());
    }

    #[test]
    fn exit_codes_match_contract() {
        assert_eq!(RunError::Broker(BrokerError::Auth).exit_code(), 2);
        assert_eq!(
            RunError::PartialSubmission {
                attempted: 3,
                failed: 1
            }
            .exit_code(),
            3
        );
        assert_eq!(
            RunError::SettlementTimeout { timeout_secs: 300 }.exit_code(),
            4
        );
        assert_eq!(
            RunError::Broker(BrokerError::RateLimited).exit_code(),
            1
        );
    }
}
