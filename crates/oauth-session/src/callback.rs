//! Provider callback parameters

use serde::Deserialize;

/// `oauth_token` / `oauth_verifier` as delivered by the provider's redirect.
///
/// Deserializes from either a query string or a form body; use `merge` to
/// combine both sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub oauth_token: Option<String>,
    #[serde(default)]
    pub oauth_verifier: Option<String>,
}

impl CallbackParams {
    pub fn new(oauth_token: impl Into<String>, oauth_verifier: impl Into<String>) -> Self {
        Self {
            oauth_token: Some(oauth_token.into()),
            oauth_verifier: Some(oauth_verifier.into()),
        }
    }

    /// Combine body and query parameters. Body values win unless empty.
    pub fn merge(body: CallbackParams, query: CallbackParams) -> Self {
        Self {
            oauth_token: prefer(body.oauth_token, query.oauth_token),
            oauth_verifier: prefer(body.oauth_verifier, query.oauth_verifier),
        }
    }

    /// Token and verifier, only when both are non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let token = self.oauth_token.as_deref().filter(|v| !v.is_empty())?;
        let verifier = self.oauth_verifier.as_deref().filter(|v| !v.is_empty())?;
        Some((token, verifier))
    }
}

fn prefer(body: Option<String>, query: Option<String>) -> Option<String> {
    body.filter(|v| !v.is_empty()).or(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_takes_precedence_over_query() {
        let merged = CallbackParams::merge(
            CallbackParams::new("body-token", "body-verifier"),
            CallbackParams::new("query-token", "query-verifier"),
        );
        assert_eq!(merged.credentials(), Some(("body-token", "body-verifier")));
    }

    #[test]
    fn empty_body_value_falls_back_to_query() {
        let body = CallbackParams {
            oauth_token: Some(String::new()),
            oauth_verifier: None,
        };
        let merged = CallbackParams::merge(body, CallbackParams::new("qt", "qv"));
        assert_eq!(merged.credentials(), Some(("qt", "qv")));
    }

    #[test]
    fn credentials_require_both_values() {
        let only_token = CallbackParams {
            oauth_token: Some("t".into()),
            oauth_verifier: None,
        };
        assert!(only_token.credentials().is_none());
        assert!(CallbackParams::new("t", "").credentials().is_none());
        assert!(CallbackParams::default().credentials().is_none());
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let params: CallbackParams = serde_json::from_str(r#"{"oauth_token":"t"}"#).unwrap();
        assert_eq!(params.oauth_token.as_deref(), Some("t"));
        assert!(params.oauth_verifier.is_none());
    }
}
