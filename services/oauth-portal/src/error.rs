//! Handler error types and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use oauth_session::Operation;
use thiserror::Error;

/// Failures a portal handler turns into a JSON error response.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] oauth_session::Error),

    /// Request finished without a usable login; carries the recorded
    /// client failure when there was one.
    #[error("not logged in")]
    LoginRequired(Option<oauth_session::Error>),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Session(oauth_session::Error::NoStorage) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Session(oauth_session::Error::NotAuthenticated) => StatusCode::UNAUTHORIZED,
            Error::Session(oauth_session::Error::ExternalFailure { operation, .. }) => {
                match operation {
                    Operation::Complete | Operation::Identify => StatusCode::UNAUTHORIZED,
                    Operation::Initiate | Operation::Call => StatusCode::BAD_GATEWAY,
                }
            }
            Error::LoginRequired(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Error::Session(oauth_session::Error::NoStorage) => "no_storage",
            Error::Session(oauth_session::Error::NotAuthenticated) | Error::LoginRequired(_) => {
                "not_authenticated"
            }
            Error::Session(oauth_session::Error::ExternalFailure { .. }) => "oauth_error",
        }
    }

    fn message(&self) -> String {
        match self {
            Error::LoginRequired(Some(cause)) => format!("{self}: {cause}"),
            other => other.to_string(),
        }
    }
}

/// JSON error body: {"error":{"type":"...","message":"..."}}
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.message(),
            }
        });
        (self.status(), axum::Json(body)).into_response()
    }
}
