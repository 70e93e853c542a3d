//! OAuth 1.0a login state bound to an HTTP session
//!
//! Tracks which token a browser session holds and keeps session storage in
//! lockstep with it. Signing and transport are delegated to an
//! `oauth_client::OAuthClient`; this crate only decides when to call it and
//! what to persist afterwards.
//!
//! Login flow:
//! 1. `AuthSession::begin_auth()` stores a request token and returns the
//!    provider's authorization URL
//! 2. The provider redirects back with `oauth_token` + `oauth_verifier`
//! 3. `AuthSession::resume()` matches the callback against the stored request
//!    token and exchanges it for an access token
//! 4. Later requests `resume()` from the stored access token, optionally
//!    verifying identity, and use `call_api()` for signed calls
//! 5. `AuthSession::kill()` logs out

pub mod callback;
pub mod error;
pub mod session;
pub mod storage;

pub use callback::CallbackParams;
pub use error::{Error, Operation, Result};
pub use session::{AuthSession, AuthState};
pub use storage::{SessionStorage, Slot};
