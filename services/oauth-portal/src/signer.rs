//! OAuth client backed by a signing gateway
//!
//! The portal never holds the consumer secret. All four OAuth interactions
//! are POSTed as JSON to a gateway that signs and forwards them to the
//! provider:
//!
//! - `POST {url}/initiate` → `{"authorize_url": "...", "token": {"key","secret"}}`
//! - `POST {url}/complete` `{"request_token", "verifier"}` → `{"token": {...}}`
//! - `POST {url}/identify` `{"access_token"}` → identity claims
//! - `POST {url}/call` `{"access_token", "request"}` → raw provider body

use std::time::Duration;

use common::Secret;
use oauth_client::{ApiRequest, ClientError, ClientFuture, OAuthClient, Token, UserInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Token as it crosses the gateway boundary.
#[derive(Serialize, Deserialize)]
struct WireToken {
    key: String,
    secret: String,
}

impl From<&Token> for WireToken {
    fn from(token: &Token) -> Self {
        Self {
            key: token.key().to_owned(),
            secret: token.secret().to_owned(),
        }
    }
}

impl From<WireToken> for Token {
    fn from(wire: WireToken) -> Self {
        Token::new(wire.key, wire.secret)
    }
}

#[derive(Deserialize)]
struct InitiateResponse {
    authorize_url: String,
    token: WireToken,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: WireToken,
}

/// `OAuthClient` implementation that delegates to the signing gateway.
pub struct SignerClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<Secret<String>>,
    timeout: Duration,
}

impl SignerClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<Secret<String>>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            http,
            base_url,
            token,
            timeout,
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        body: &B,
    ) -> oauth_client::Result<reqwest::Response> {
        let mut request = self
            .http
            .post(format!("{}/{operation}", self.base_url))
            .timeout(self.timeout)
            .json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("{operation} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!(operation, "signing gateway call succeeded");
        Ok(response)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &B,
    ) -> oauth_client::Result<T> {
        self.post(operation, body)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("{operation}: {e}")))
    }
}

impl OAuthClient for SignerClient {
    fn initiate(&self) -> ClientFuture<'_, (String, Token)> {
        Box::pin(async move {
            let response: InitiateResponse =
                self.post_json("initiate", &serde_json::json!({})).await?;
            Ok((response.authorize_url, response.token.into()))
        })
    }

    fn complete<'a>(
        &'a self,
        request_token: &'a Token,
        verifier: &'a str,
    ) -> ClientFuture<'a, Token> {
        Box::pin(async move {
            let body = serde_json::json!({
                "request_token": WireToken::from(request_token),
                "verifier": verifier,
            });
            let response: TokenResponse = self.post_json("complete", &body).await?;
            Ok(response.token.into())
        })
    }

    fn identify<'a>(&'a self, access_token: &'a Token) -> ClientFuture<'a, UserInfo> {
        Box::pin(async move {
            let body = serde_json::json!({ "access_token": WireToken::from(access_token) });
            self.post_json("identify", &body).await
        })
    }

    fn call<'a>(
        &'a self,
        access_token: &'a Token,
        request: &'a ApiRequest,
    ) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let body = serde_json::json!({
                "access_token": WireToken::from(access_token),
                "request": request,
            });
            self.post("call", &body)
                .await?
                .text()
                .await
                .map_err(|e| ClientError::InvalidResponse(format!("call: {e}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use tokio::net::TcpListener;

    /// Start a fake signing gateway on a random local port.
    async fn start_gateway() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let app = axum::Router::new()
                .route(
                    "/initiate",
                    post(|headers: HeaderMap| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("");
                        if auth != "Bearer gateway-token" {
                            return (StatusCode::FORBIDDEN, Json(serde_json::json!({})));
                        }
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({
                                "authorize_url": "https://provider.test/authorize?oauth_token=rk",
                                "token": { "key": "rk", "secret": "rs" }
                            })),
                        )
                    }),
                )
                .route(
                    "/complete",
                    post(|Json(body): Json<serde_json::Value>| async move {
                        if body["verifier"] != "good" {
                            return (
                                StatusCode::UNAUTHORIZED,
                                "mwoauth-invalid-authorization".to_string(),
                            );
                        }
                        let key = format!("ak-{}", body["request_token"]["key"].as_str().unwrap());
                        (
                            StatusCode::OK,
                            serde_json::json!({ "token": { "key": key, "secret": "as" } })
                                .to_string(),
                        )
                    }),
                )
                .route(
                    "/identify",
                    post(|| async { (StatusCode::OK, "not json at all") }),
                )
                .route(
                    "/call",
                    post(|Json(body): Json<serde_json::Value>| async move {
                        format!(
                            "{} {} as {}",
                            body["request"]["method"].as_str().unwrap(),
                            body["request"]["url"].as_str().unwrap(),
                            body["access_token"]["key"].as_str().unwrap()
                        )
                    }),
                );
            axum::serve(listener, app).await.unwrap();
        });

        (url, handle)
    }

    fn client(url: &str, token: Option<&str>) -> SignerClient {
        SignerClient::new(
            reqwest::Client::new(),
            format!("{url}/"),
            token.map(|t| Secret::new(t.to_owned())),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn initiate_returns_url_and_request_token() {
        let (url, _server) = start_gateway().await;
        let client = client(&url, Some("gateway-token"));

        let (authorize_url, token) = client.initiate().await.unwrap();
        assert_eq!(authorize_url, "https://provider.test/authorize?oauth_token=rk");
        assert_eq!(token, Token::new("rk", "rs"));
    }

    #[tokio::test]
    async fn missing_gateway_token_is_rejected() {
        let (url, _server) = start_gateway().await;
        let client = client(&url, None);

        let err = client.initiate().await.unwrap_err();
        assert!(
            matches!(err, ClientError::Rejected { status: 403, .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn complete_sends_request_token_and_verifier() {
        let (url, _server) = start_gateway().await;
        let client = client(&url, Some("gateway-token"));
        let request_token = Token::new("rk", "rs");

        let access = client.complete(&request_token, "good").await.unwrap();
        assert_eq!(access, Token::new("ak-rk", "as"));

        let err = client.complete(&request_token, "bad").await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Rejected {
                status: 401,
                message: "mwoauth-invalid-authorization".into()
            }
        );
    }

    #[tokio::test]
    async fn identify_with_garbage_body_is_invalid_response() {
        let (url, _server) = start_gateway().await;
        let client = client(&url, Some("gateway-token"));

        let err = client.identify(&Token::new("ak", "as")).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn call_returns_raw_body() {
        let (url, _server) = start_gateway().await;
        let client = client(&url, Some("gateway-token"));

        let body = client
            .call(
                &Token::new("ak", "as"),
                &ApiRequest::get("https://provider.test/w/api.php?action=query"),
            )
            .await
            .unwrap();
        assert_eq!(body, "GET https://provider.test/w/api.php?action=query as ak");
    }

    #[tokio::test]
    async fn unreachable_gateway_is_http_error() {
        let client = client("http://127.0.0.1:1", None);
        let err = client.initiate().await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)), "got: {err:?}");
    }
}
