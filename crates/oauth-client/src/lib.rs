//! OAuth 1.0a client capability
//!
//! Defines the `OAuthClient` trait that decouples the session state machine
//! from how requests are actually signed and sent. The session crate never
//! sees consumer secrets, signatures or wire formats; it only hands tokens to
//! an implementation of this trait and gets tokens, identities and response
//! bodies back.

pub mod token;
pub mod types;

pub use token::Token;
pub use types::{ApiRequest, HttpMethod, UserInfo};

use std::future::Future;
use std::pin::Pin;

/// Errors raised by an OAuth client implementation.
///
/// Cloneable so the session layer can both record and return the same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Transport failure before any response arrived
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The provider answered but refused the request
    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The provider answered with something we could not interpret
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Boxed future returned by every client operation.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The four provider interactions of a three-legged OAuth 1.0a flow.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn OAuthClient>`).
pub trait OAuthClient: Send + Sync {
    /// Obtain a request token and the URL the user must visit to authorize it.
    fn initiate(&self) -> ClientFuture<'_, (String, Token)>;

    /// Exchange an authorized request token plus verifier for an access token.
    fn complete<'a>(&'a self, request_token: &'a Token, verifier: &'a str)
    -> ClientFuture<'a, Token>;

    /// Fetch the identity bound to an access token.
    fn identify<'a>(&'a self, access_token: &'a Token) -> ClientFuture<'a, UserInfo>;

    /// Make a signed API call and return the raw response body.
    fn call<'a>(&'a self, access_token: &'a Token, request: &'a ApiRequest)
    -> ClientFuture<'a, String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FixedClient;

    impl OAuthClient for FixedClient {
        fn initiate(&self) -> ClientFuture<'_, (String, Token)> {
            Box::pin(async {
                Ok((
                    "https://provider.test/authorize?oauth_token=rk".to_string(),
                    Token::new("rk", "rs"),
                ))
            })
        }

        fn complete<'a>(
            &'a self,
            request_token: &'a Token,
            verifier: &'a str,
        ) -> ClientFuture<'a, Token> {
            Box::pin(async move {
                if verifier.is_empty() {
                    return Err(ClientError::Rejected {
                        status: 401,
                        message: "missing verifier".into(),
                    });
                }
                Ok(Token::new(format!("ak-for-{}", request_token.key()), "as"))
            })
        }

        fn identify<'a>(&'a self, _access_token: &'a Token) -> ClientFuture<'a, UserInfo> {
            Box::pin(async { Err(ClientError::Http("connection refused".into())) })
        }

        fn call<'a>(
            &'a self,
            _access_token: &'a Token,
            request: &'a ApiRequest,
        ) -> ClientFuture<'a, String> {
            Box::pin(async move { Ok(format!("{} {}", request.method.as_str(), request.url)) })
        }
    }

    #[tokio::test]
    async fn trait_is_usable_as_shared_object() {
        let client: Arc<dyn OAuthClient> = Arc::new(FixedClient);

        let (url, request_token) = client.initiate().await.unwrap();
        assert!(url.contains("oauth_token=rk"));

        let access = client.complete(&request_token, "v").await.unwrap();
        assert_eq!(access.key(), "ak-for-rk");

        let body = client
            .call(&access, &ApiRequest::get("https://provider.test/api"))
            .await
            .unwrap();
        assert_eq!(body, "GET https://provider.test/api");
    }

    #[test]
    fn client_error_display() {
        let err = ClientError::Rejected {
            status: 401,
            message: "mwoauth-invalid-authorization".into(),
        };
        assert_eq!(
            err.to_string(),
            "provider rejected request (401): mwoauth-invalid-authorization"
        );
        assert!(
            ClientError::Http("timeout".into())
                .to_string()
                .contains("timeout")
        );
    }
}
