//! Error types for the backend client and its credential stores.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Why a 401 was surfaced to the caller instead of being recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    /// The request had already been through its one refresh-and-retry cycle.
    AlreadyRetried,
    /// No refresh token was stored, so no refresh was attempted.
    NoRefreshToken,
}

impl std::fmt::Display for UnauthorizedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnauthorizedReason::AlreadyRetried => f.write_str("rejected after token refresh"),
            UnauthorizedReason::NoRefreshToken => f.write_str("no refresh token stored"),
        }
    }
}

/// Failure of the `token/refresh/` exchange.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh token rejected with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("refresh request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),

    /// The refresh this request waited on failed in another caller.
    #[error("concurrent token refresh failed: {0}")]
    Concurrent(String),
}

/// Failure reading or writing a credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential store holds invalid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unauthorized ({reason}): {body}")]
    Unauthorized {
        reason: UnauthorizedReason,
        body: String,
    },

    #[error("token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("backend returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("failed to decode response body: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    /// Returns `true` when the session can no longer authenticate and the
    /// application should send the user back through login.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthorized { .. } | ClientError::Refresh(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_classification() {
        let unauthorized = ClientError::Unauthorized {
            reason: UnauthorizedReason::NoRefreshToken,
            body: String::new(),
        };
        assert!(unauthorized.is_unauthenticated());

        let refresh = ClientError::Refresh(RefreshError::MalformedResponse("empty".into()));
        assert!(refresh.is_unauthenticated());

        let api = ClientError::Api {
            status: StatusCode::FORBIDDEN,
            message: "nope".into(),
        };
        assert!(!api.is_unauthenticated());
        assert!(!ClientError::Timeout(Duration::from_secs(1)).is_unauthenticated());
    }

    #[test]
    fn test_unauthorized_message_names_reason() {
        let err = ClientError::Unauthorized {
            reason: UnauthorizedReason::AlreadyRetried,
            body: "{\"detail\":\"expired\"}".into(),
        };
        assert!(err.to_string().contains("rejected after token refresh"));
    }
}
