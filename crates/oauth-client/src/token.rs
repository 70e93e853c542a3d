//! OAuth 1.0a token pair

use common::Secret;

/// A request token or access token: public key plus shared secret.
///
/// Immutable once built. Equality compares both halves; `Debug` never prints
/// the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    key: String,
    secret: Secret<String>,
}

impl Token {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: Secret::new(secret.into()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        self.secret.expose()
    }
}
