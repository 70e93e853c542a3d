//! Per-request authentication state machine
//!
//! An `AuthSession` is rebuilt for every inbound request from the session
//! storage snapshot, performs at most one transition, and is then dropped.
//! The caller persists the snapshot afterwards.
//!
//! States and transitions:
//! - Unauthenticated → PendingVerification (`begin_auth`)
//! - PendingVerification → Authenticated (`resume` with a matching callback)
//! - Authenticated → Verified (`resume` with identity verification)
//! - Authenticated → Unauthenticated (identity verification failed)
//! - any → Unauthenticated (`kill`)
//!
//! Every transition that grants or drops privileges rotates the storage
//! identity before writing tokens, so a fixated session id never carries a
//! login.

use oauth_client::{ApiRequest, ClientError, OAuthClient, Token, UserInfo};
use tracing::{debug, info, warn};

use crate::callback::CallbackParams;
use crate::error::{Error, Operation, Result};
use crate::storage::{ACCESS_SLOTS, REQUEST_SLOTS, SessionStorage};

/// Observable authentication state, derived from which slots are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    /// Request token issued, waiting for the provider callback
    PendingVerification,
    /// Access token held
    Authenticated,
    /// Access token held and identity confirmed by the provider
    Verified,
}

impl AuthState {
    /// Status label for responses and logging.
    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::PendingVerification => "pending_verification",
            AuthState::Authenticated => "authenticated",
            AuthState::Verified => "verified",
        }
    }
}

/// OAuth login state bound to one request's session storage.
///
/// Invariant: `user_info` is only ever `Some` while `access_token` is.
pub struct AuthSession<'a> {
    client: &'a dyn OAuthClient,
    storage: &'a mut dyn SessionStorage,
    request_token: Option<Token>,
    access_token: Option<Token>,
    user_info: Option<UserInfo>,
    last_error: Option<Error>,
}

impl<'a> AuthSession<'a> {
    /// Fresh, unauthenticated session. Storage is not read.
    pub fn new(client: &'a dyn OAuthClient, storage: &'a mut dyn SessionStorage) -> Self {
        Self {
            client,
            storage,
            request_token: None,
            access_token: None,
            user_info: None,
            last_error: None,
        }
    }

    /// Restore login state from storage, completing a pending flow if the
    /// request carries the provider's callback.
    ///
    /// A stored access token is trusted as-is unless `verify_identity` is set,
    /// in which case the provider is asked who it belongs to. A token the
    /// provider can't identify is treated as revoked and removed.
    pub async fn resume(
        client: &'a dyn OAuthClient,
        storage: &'a mut dyn SessionStorage,
        callback: &CallbackParams,
        verify_identity: bool,
    ) -> Self {
        let mut session = Self::new(client, storage);
        if !session.storage.is_active() {
            debug!("no active session storage, resuming unauthenticated");
            return session;
        }

        match ACCESS_SLOTS.load(&*session.storage) {
            Some(access_token) => {
                debug!("restored access token from session");
                session.access_token = Some(access_token);
            }
            None => {
                if !session.complete_pending(callback).await {
                    return session;
                }
            }
        }

        if verify_identity {
            session.verify_identity().await;
        }
        session
    }

    /// Start a new authorization flow and return the URL to send the user to.
    ///
    /// Any existing login is dropped: the access token is cleared from memory
    /// and storage, the storage identity is rotated, and the new request token
    /// is persisted.
    pub async fn begin_auth(&mut self) -> Result<String> {
        if !self.storage.is_active() {
            return Err(Error::NoStorage);
        }

        self.last_error = None;
        let result = self.client.initiate().await;
        let (url, request_token) = match result {
            Ok(pair) => pair,
            Err(e) => return Err(self.record(Operation::Initiate, e)),
        };

        self.access_token = None;
        self.user_info = None;
        ACCESS_SLOTS.clear(&mut *self.storage);
        self.storage.rotate_identity();
        REQUEST_SLOTS.store(&mut *self.storage, &request_token);
        self.request_token = Some(request_token);

        info!("authorization flow started, request token stored");
        Ok(url)
    }

    /// Make a signed API call with the held access token.
    ///
    /// A failed call is recorded but leaves the login intact.
    pub async fn call_api(&mut self, request: &ApiRequest) -> Result<String> {
        let Some(access_token) = self.access_token.as_ref() else {
            return Err(Error::NotAuthenticated);
        };

        self.last_error = None;
        let result = self.client.call(access_token, request).await;
        result.map_err(|e| self.record(Operation::Call, e))
    }

    /// Log out: remove every token slot, rotate the storage identity and
    /// forget all in-memory state except the last error.
    pub fn kill(&mut self) -> Result<()> {
        if !self.storage.is_active() {
            return Err(Error::NoStorage);
        }

        REQUEST_SLOTS.clear(&mut *self.storage);
        ACCESS_SLOTS.clear(&mut *self.storage);
        self.storage.rotate_identity();

        self.request_token = None;
        self.access_token = None;
        self.user_info = None;
        info!("session killed");
        Ok(())
    }

    pub fn state(&self) -> AuthState {
        match (&self.access_token, &self.user_info, &self.request_token) {
            (Some(_), Some(_), _) => AuthState::Verified,
            (Some(_), None, _) => AuthState::Authenticated,
            (None, _, Some(_)) => AuthState::PendingVerification,
            (None, _, None) => AuthState::Unauthenticated,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn is_verified(&self) -> bool {
        self.access_token.is_some() && self.user_info.is_some()
    }

    pub fn request_token(&self) -> Option<&Token> {
        self.request_token.as_ref()
    }

    pub fn access_token(&self) -> Option<&Token> {
        self.access_token.as_ref()
    }

    pub fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    /// Most recent OAuth client failure. Only a new client call clears it.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Exchange the stored request token for an access token when the
    /// callback matches it. Returns whether an access token is now held.
    async fn complete_pending(&mut self, callback: &CallbackParams) -> bool {
        let Some((oauth_token, verifier)) = callback.credentials() else {
            return false;
        };
        let Some(request_token) = REQUEST_SLOTS.load(&*self.storage) else {
            debug!("callback received without a pending request token");
            return false;
        };
        if request_token.key() != oauth_token {
            warn!("callback oauth_token does not match the pending request token");
            return false;
        }

        self.last_error = None;
        let result = self.client.complete(&request_token, verifier).await;
        match result {
            Ok(access_token) => {
                REQUEST_SLOTS.clear(&mut *self.storage);
                self.storage.rotate_identity();
                ACCESS_SLOTS.store(&mut *self.storage, &access_token);
                self.request_token = None;
                self.access_token = Some(access_token);
                info!("authorization completed, access token stored");
                true
            }
            Err(e) => {
                // Request slots stay so the same verifier can be retried.
                self.record(Operation::Complete, e);
                false
            }
        }
    }

    async fn verify_identity(&mut self) {
        let Some(access_token) = self.access_token.as_ref() else {
            return;
        };

        self.last_error = None;
        let result = self.client.identify(access_token).await;
        match result {
            Ok(user_info) => {
                debug!(username = %user_info.username, "identity verified");
                self.user_info = Some(user_info);
            }
            Err(e) => {
                self.record(Operation::Identify, e);
                ACCESS_SLOTS.clear(&mut *self.storage);
                self.access_token = None;
                self.user_info = None;
                warn!("identity check failed, access token revoked from session");
            }
        }
    }

    fn record(&mut self, operation: Operation, source: ClientError) -> Error {
        warn!(%operation, error = %source, "OAuth client call failed");
        let err = Error::ExternalFailure { operation, source };
        self.last_error = Some(err.clone());
        err
    }
}
