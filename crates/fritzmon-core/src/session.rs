// ── Router session manager ──
//
// Owns the session id for the home-automation interface. Every device
// call goes through `token()`; an auth-class failure anywhere drops the
// token and announces `HubEvent::AuthRequired`. Nothing here retries a
// login on its own: new credentials come in through `register()`.

use std::sync::{Arc, Mutex};

use secrecy::SecretString;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use fritzmon_api::{Credentials, SessionId};

use crate::error::CoreError;
use crate::hub::HubEvent;
use crate::router::RouterApi;

// ── Credential persistence ─────────────────────────────────────────

/// Where registered credentials live between runs.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>, CoreError>;
    fn save(&self, credentials: &Credentials) -> Result<(), CoreError>;
    fn clear(&self) -> Result<(), CoreError>;
}

/// Process-lifetime credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Some(credentials)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Credentials>>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Internal("credential store lock poisoned".into()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, CoreError> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), CoreError> {
        *self.lock()? = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        *self.lock()? = None;
        Ok(())
    }
}

// ── RouterSession ──────────────────────────────────────────────────

/// Authentication state for one router.
pub struct RouterSession {
    api: Arc<dyn RouterApi>,
    store: Arc<dyn CredentialStore>,
    token: watch::Sender<Option<SessionId>>,
    events: broadcast::Sender<HubEvent>,
}

impl RouterSession {
    pub fn new(
        api: Arc<dyn RouterApi>,
        store: Arc<dyn CredentialStore>,
        events: broadcast::Sender<HubEvent>,
    ) -> Self {
        let (token, _) = watch::channel(None);
        Self {
            api,
            store,
            token,
            events,
        }
    }

    pub fn api(&self) -> &Arc<dyn RouterApi> {
        &self.api
    }

    /// Token present and non-zero.
    pub fn is_authenticated(&self) -> bool {
        self.token.borrow().as_ref().is_some_and(SessionId::is_valid)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SessionId>> {
        self.token.subscribe()
    }

    /// Current session id, or an auth error when there is none.
    pub fn token(&self) -> Result<SessionId, CoreError> {
        self.token
            .borrow()
            .as_ref()
            .filter(|sid| sid.is_valid())
            .cloned()
            .ok_or_else(|| CoreError::AuthenticationFailed {
                message: "not logged in to the router".into(),
            })
    }

    /// Log in and keep the resulting session id.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<SessionId, CoreError> {
        match self.api.authenticate(credentials).await {
            Ok(sid) if sid.is_valid() => {
                debug!(username = %credentials.username, "router session established");
                self.token.send_replace(Some(sid.clone()));
                Ok(sid)
            }
            Ok(_) => {
                self.invalidate();
                Err(CoreError::AuthenticationFailed {
                    message: "router returned an empty session".into(),
                })
            }
            Err(e) => {
                if e.is_auth_expired() {
                    self.invalidate();
                }
                Err(e.into())
            }
        }
    }

    /// Drop the session id. Announces `AuthRequired` if one was held.
    pub fn invalidate(&self) {
        let previous = self.token.send_replace(None);
        if previous.is_some_and(|sid| sid.is_valid()) {
            warn!("router session invalidated, re-registration required");
            self.announce_auth_required();
        }
    }

    /// Authenticate with `configured` (or the stored credentials) and
    /// confirm the session once.
    ///
    /// Credentials the router rejects are removed from the store; network
    /// failures leave them alone.
    pub async fn initialize(&self, configured: Option<Credentials>) -> Result<(), CoreError> {
        // Start from scratch; failures below announce `AuthRequired` once.
        self.token.send_replace(None);

        let credentials = match configured {
            Some(c) => c,
            None => match self.store.load()? {
                Some(c) => c,
                None => {
                    self.announce_auth_required();
                    return Err(CoreError::NoCredentials);
                }
            },
        };

        let sid = match self.authenticate(&credentials).await {
            Ok(sid) => sid,
            Err(e) => {
                if e.is_auth() {
                    self.forget_credentials();
                    self.announce_auth_required();
                }
                return Err(e);
            }
        };

        match self.api.check_auth(&sid).await {
            Ok(true) => {
                info!("router authentication confirmed");
                Ok(())
            }
            Ok(false) => {
                self.forget_credentials();
                self.invalidate();
                Err(CoreError::AuthenticationFailed {
                    message: "router rejected the new session".into(),
                })
            }
            Err(e) => {
                if e.is_auth_expired() {
                    self.forget_credentials();
                }
                self.invalidate();
                Err(e.into())
            }
        }
    }

    /// Persist new credentials and run [`initialize`](Self::initialize) with them.
    pub async fn register(
        &self,
        username: impl Into<String>,
        password: SecretString,
    ) -> Result<(), CoreError> {
        let credentials = Credentials::new(username, password);
        self.store.save(&credentials)?;
        self.initialize(Some(credentials)).await
    }

    /// End the session on the router without announcing `AuthRequired`.
    pub async fn logout(&self) {
        let Some(sid) = self.token.send_replace(None) else {
            return;
        };
        if !sid.is_valid() {
            return;
        }
        if let Err(e) = self.api.logout(&sid).await {
            warn!(error = %e, "logout failed (non-fatal)");
        }
    }

    /// Map an API result, invalidating the session on auth-class failures.
    pub fn observe<T>(&self, result: Result<T, fritzmon_api::Error>) -> Result<T, CoreError> {
        result.map_err(|e| {
            if e.is_auth_expired() {
                self.invalidate();
            }
            CoreError::from(e)
        })
    }

    fn announce_auth_required(&self) {
        let _ = self.events.send(HubEvent::AuthRequired);
    }

    fn forget_credentials(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored credentials");
        }
    }
}
