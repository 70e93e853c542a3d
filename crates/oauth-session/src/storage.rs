//! Session storage capability and token slot bookkeeping
//!
//! Session storage is a request-scoped map from named slots to strings,
//! bound to a rotatable identity (the session id). The backend behind it
//! (in-memory map, Redis, signed cookie) is the caller's concern; it is
//! expected to serialize access per identity.
//!
//! Tokens are persisted as two slots each. A pair only counts as present
//! when both halves are set and non-empty.

use oauth_client::Token;

/// Named slots the session state machine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    RequestKey,
    RequestSecret,
    AccessKey,
    AccessSecret,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::RequestKey,
        Slot::RequestSecret,
        Slot::AccessKey,
        Slot::AccessSecret,
    ];

    /// Storage key for this slot.
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::RequestKey => "request_key",
            Slot::RequestSecret => "request_secret",
            Slot::AccessKey => "access_key",
            Slot::AccessSecret => "access_secret",
        }
    }
}

/// Request-scoped session storage.
pub trait SessionStorage: Send {
    /// Whether a session context exists for this request.
    fn is_active(&self) -> bool;

    fn get(&self, slot: Slot) -> Option<&str>;

    fn set(&mut self, slot: Slot, value: String);

    fn unset(&mut self, slot: Slot);

    /// Issue a new session identity, invalidating the old one.
    /// Slot contents carry over to the new identity.
    fn rotate_identity(&mut self);
}

/// The key/secret slot pair a token is persisted under.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokenSlots {
    key: Slot,
    secret: Slot,
}

pub(crate) const REQUEST_SLOTS: TokenSlots = TokenSlots {
    key: Slot::RequestKey,
    secret: Slot::RequestSecret,
};

pub(crate) const ACCESS_SLOTS: TokenSlots = TokenSlots {
    key: Slot::AccessKey,
    secret: Slot::AccessSecret,
};

impl TokenSlots {
    pub(crate) fn load<S: SessionStorage + ?Sized>(&self, storage: &S) -> Option<Token> {
        let key = storage.get(self.key).filter(|v| !v.is_empty())?;
        let secret = storage.get(self.secret).filter(|v| !v.is_empty())?;
        Some(Token::new(key, secret))
    }

    pub(crate) fn store<S: SessionStorage + ?Sized>(&self, storage: &mut S, token: &Token) {
        storage.set(self.key, token.key().to_owned());
        storage.set(self.secret, token.secret().to_owned());
    }

    pub(crate) fn clear<S: SessionStorage + ?Sized>(&self, storage: &mut S) {
        storage.unset(self.key);
        storage.unset(self.secret);
    }
}
