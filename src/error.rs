use serde_json::Value as JsonValue;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Request shape or configuration rejected before any network call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Every permitted attempt failed; carries the last attempt's error.
    #[error("request failed after {attempts} attempt(s): {source}")]
    RetryExhausted {
        /// Number of attempts performed, including the first one.
        attempts: usize,
        /// Error of the final attempt.
        #[source]
        source: TransportError,
    },
    /// Caller identity is not allowed to read secrets.
    #[error("permission denied for role {role:?} (account '{account}')")]
    PermissionDenied {
        /// Role claim presented by the caller, if any.
        role: Option<String>,
        /// Account the caller is connected as.
        account: String,
    },
    /// Secret store backend could not complete the lookup.
    #[error("secret store error: {0}")]
    SecretStore(String),
}

/// Failure of a single request attempt.
///
/// These never reach the caller directly from
/// [`HttpDispatcher::dispatch`](crate::HttpDispatcher::dispatch); they are
/// retried and finally wrapped in [`DispatchError::RetryExhausted`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network, timeout or body read error from `reqwest`.
    #[error("transport error: {0}")]
    Request(#[from] reqwest::Error),
    /// Header name or value that cannot be put on the wire.
    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },
    /// Server answered with a 5xx status.
    #[error("server error {status_code}: {response}")]
    Status {
        status_code: u16,
        response: JsonValue,
    },
    /// Failure reported by a non-reqwest transport.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Returns `true` when the underlying request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(err) if err.is_timeout())
    }

    /// Status code of a server error, if this error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            Self::Request(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}
