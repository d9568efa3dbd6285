//! Session context for the cashier screens.
//!
//! The shell owns where sessions live (browser storage, keychain, ...);
//! this crate only defines the typed shape and a seam to read it. Screens
//! receive the session explicitly at construction instead of reaching
//! into an ambient store.

use serde::{Deserialize, Serialize};

/// The signed-in account, as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub role: String,
}

impl UserAccount {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

/// An authenticated session: bearer token plus the account it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserAccount,
}

/// Where the shell keeps the active session between visits.
pub trait SessionStore: Send + Sync {
    /// The active session, if one is stored.
    fn load(&self) -> Option<Session>;

    /// Persist a session (after login).
    fn save(&self, session: &Session);

    /// Drop the stored session (logout).
    fn clear(&self);
}

/// In-memory store, for tests and hosts that persist sessions themselves.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: std::sync::Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: std::sync::Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.inner.lock().ok().and_then(|guard| guard.clone())
    }

    fn save(&self, session: &Session) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(session.clone());
        }
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = None;
        }
    }
}
