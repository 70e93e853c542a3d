//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The signing gateway token is loaded from SIGNER_TOKEN env var or
//! token_file, never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub signer: SignerConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Where the browser lands after a completed login
    #[serde(default = "default_post_login_redirect")]
    pub post_login_redirect: String,
}

/// Browser session settings
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_true")]
    pub secure_cookie: bool,
    /// Ask the provider to identify the access token on every resume
    #[serde(default = "default_true")]
    pub verify_identity: bool,
    /// Upper bound on stored sessions; the least recently used is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Sessions untouched for this long are dropped
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure_cookie: true,
            verify_identity: true,
            max_sessions: default_max_sessions(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// Signing gateway connection settings
#[derive(Debug, Deserialize)]
pub struct SignerConfig {
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(skip)]
    pub token: Option<Secret<String>>,
    /// Path to a file containing the gateway token (alternative to SIGNER_TOKEN env var)
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

fn default_max_connections() -> usize {
    1000
}

fn default_post_login_redirect() -> String {
    "/".into()
}

fn default_cookie_name() -> String {
    "oauth_session".into()
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_idle_timeout() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Signer token resolution order:
    /// 1. SIGNER_TOKEN env var
    /// 2. token_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.signer.url.starts_with("http://") && !config.signer.url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "signer.url must start with http:// or https://, got: {}",
                config.signer.url
            )));
        }

        if config.signer.timeout_secs == 0 {
            return Err(common::Error::Config(
                "signer.timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "server.max_connections must be greater than 0".into(),
            ));
        }

        if config.session.cookie_name.is_empty() {
            return Err(common::Error::Config(
                "session.cookie_name must not be empty".into(),
            ));
        }

        if config.session.max_sessions == 0 {
            return Err(common::Error::Config(
                "session.max_sessions must be greater than 0".into(),
            ));
        }

        if config.session.idle_timeout_secs == 0 {
            return Err(common::Error::Config(
                "session.idle_timeout_secs must be greater than 0".into(),
            ));
        }

        if !config.server.post_login_redirect.starts_with('/') {
            return Err(common::Error::Config(format!(
                "server.post_login_redirect must be a local path, got: {}",
                config.server.post_login_redirect
            )));
        }

        if let Ok(token) = std::env::var("SIGNER_TOKEN") {
            config.signer.token = Some(Secret::new(token));
        } else if let Some(ref token_file) = config.signer.token_file {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            let token = token.trim().to_owned();
            if !token.is_empty() {
                config.signer.token = Some(Secret::new(token));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("oauth-portal.toml")
    }
}
