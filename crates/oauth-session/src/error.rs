//! Error types for session transitions

use std::fmt;

use oauth_client::ClientError;

/// Which OAuth client interaction a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initiate,
    Complete,
    Identify,
    Call,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Initiate => "initiate",
            Operation::Complete => "complete",
            Operation::Identify => "identify",
            Operation::Call => "call",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by `AuthSession` transitions.
///
/// `ExternalFailure` is also what gets recorded as the session's last error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no active session storage")]
    NoStorage,

    #[error("not authenticated: no access token held")]
    NotAuthenticated,

    #[error("OAuth {operation} failed: {source}")]
    ExternalFailure {
        operation: Operation,
        #[source]
        source: ClientError,
    },
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
