//! Request and identity types exchanged with the OAuth client

use serde::{Deserialize, Serialize};

/// HTTP method for a signed API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// A signed API call made on behalf of the access token holder.
///
/// `form` is only sent for POST requests; GET requests carry their
/// parameters in `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<Vec<(String, String)>>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            form: None,
        }
    }

    pub fn post(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            form: Some(form),
        }
    }
}

/// Identity payload returned by the provider's identify endpoint.
///
/// Only `username` and `sub` are guaranteed. Anything the provider adds
/// beyond the known fields is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    /// Provider-wide user id
    pub sub: String,
    #[serde(default)]
    pub editcount: Option<u64>,
    #[serde(default)]
    pub confirmed_email: bool,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub registered: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub rights: Vec<String>,
    #[serde(default)]
    pub grants: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
