use std::sync::{
    RwLock,
    atomic::{AtomicBool, Ordering},
};

/// Read-only view of the bearer token used by the API client.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Side effect fired when the backend answers 401.
pub trait UnauthorizedHandler: Send + Sync {
    fn redirect_to_login(&self);
}

/// Console session: owns the token and the pending login redirect.
///
/// Only the login screen writes the token. The client sees the session
/// through [`TokenSource`] and [`UnauthorizedHandler`].
#[derive(Debug, Default)]
pub struct Session {
    token: RwLock<Option<String>>,
    login_required: AtomicBool,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
            login_required: AtomicBool::new(false),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    pub fn sign_in(&self, token: String) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token);
        }
        self.login_required.store(false, Ordering::SeqCst);
    }

    pub fn sign_out(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }

    /// Returns `true` once per redirect request.
    pub fn take_login_redirect(&self) -> bool {
        self.login_required.swap(false, Ordering::SeqCst)
    }
}

impl TokenSource for Session {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|slot| slot.clone())
    }
}

impl UnauthorizedHandler for Session {
    fn redirect_to_login(&self) {
        tracing::warn!("backend rejected the session token, redirecting to login");
        self.login_required.store(true, Ordering::SeqCst);
    }
}
