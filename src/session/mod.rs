//! Client session and credential persistence.
//!
//! [`Session`] is the one authoritative copy of the credentials in memory.
//! [`CredentialStore`] is the async trait for a persistence backend.
//! [`DurableStore`] keeps every key; [`CookieStore`] keeps the access token
//! and profile with a seven-day expiry. [`Session::sync`] fans the in-memory
//! state out to every backend.

mod cookie;
mod durable;
mod file;

pub use cookie::{CookieStore, DEFAULT_COOKIE_TTL_DAYS};
pub use durable::DurableStore;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::services::account_api::User;

/// Names under which credentials are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    User,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [
        CredentialKey::AccessToken,
        CredentialKey::RefreshToken,
        CredentialKey::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::AccessToken => "token",
            CredentialKey::RefreshToken => "refresh_token",
            CredentialKey::User => "user",
        }
    }
}

/// A persistence backend for credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this backend persists `key` at all. Writes for other keys are ignored.
    fn holds(&self, _key: CredentialKey) -> bool {
        true
    }

    async fn get(&self, key: CredentialKey) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: CredentialKey, value: &str) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: CredentialKey) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl SessionState {
    fn value(&self, key: CredentialKey) -> Result<Option<String>, StoreError> {
        Ok(match key {
            CredentialKey::AccessToken => self.access_token.clone(),
            CredentialKey::RefreshToken => self.refresh_token.clone(),
            CredentialKey::User => match &self.user {
                Some(user) => Some(serde_json::to_string(user)?),
                None => None,
            },
        })
    }
}

pub struct Session {
    state: RwLock<SessionState>,
    stores: Vec<Arc<dyn CredentialStore>>,
}

impl Session {
    /// Creates an empty session over `stores`. Earlier stores take
    /// precedence when [`Session::load`] finds the same key in several.
    pub fn new(stores: Vec<Arc<dyn CredentialStore>>) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            stores,
        }
    }

    /// A durable store followed by a cookie store, both in memory.
    pub fn in_memory() -> Self {
        Self::new(vec![
            Arc::new(DurableStore::in_memory()),
            Arc::new(CookieStore::in_memory()),
        ])
    }

    /// Opens the file-backed stores under `dir` and loads whatever they hold.
    pub async fn open_dir(dir: &Path) -> Result<Self, StoreError> {
        let durable = DurableStore::open(dir.join("credentials.json")).await?;
        let cookies = CookieStore::open(dir.join("cookies.json")).await?;
        let session = Self::new(vec![Arc::new(durable), Arc::new(cookies)]);
        session.load().await?;
        Ok(session)
    }

    pub fn stores(&self) -> &[Arc<dyn CredentialStore>] {
        &self.stores
    }

    /// Replaces the in-memory state with what the backends hold, reading
    /// each key from the first backend that has it.
    pub async fn load(&self) -> Result<SessionState, StoreError> {
        let mut loaded = SessionState::default();

        for key in CredentialKey::ALL {
            let mut found = None;
            for store in self.stores.iter().filter(|s| s.holds(key)) {
                if let Some(value) = store.get(key).await?.filter(|v| !v.is_empty()) {
                    debug!(key = key.as_str(), store = store.name(), "Loaded credential");
                    found = Some(value);
                    break;
                }
            }

            match key {
                CredentialKey::AccessToken => loaded.access_token = found,
                CredentialKey::RefreshToken => loaded.refresh_token = found,
                CredentialKey::User => {
                    loaded.user = found.and_then(|raw| match serde_json::from_str(&raw) {
                        Ok(user) => Some(user),
                        Err(e) => {
                            warn!(error = %e, "Ignoring unreadable cached user profile");
                            None
                        }
                    });
                }
            }
        }

        *self.state.write().await = loaded.clone();
        Ok(loaded)
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_some()
    }

    /// Starts a session after login and persists it everywhere.
    pub async fn begin(
        &self,
        access_token: String,
        refresh_token: String,
        user: User,
    ) -> Result<(), StoreError> {
        {
            let mut state = self.state.write().await;
            state.access_token = Some(access_token);
            state.refresh_token = Some(refresh_token);
            state.user = Some(user);
        }
        info!("Session started");
        self.sync().await
    }

    /// Swaps in a refreshed access token, leaving the refresh token and profile alone.
    pub async fn replace_access_token(&self, access_token: String) -> Result<(), StoreError> {
        self.state.write().await.access_token = Some(access_token);
        self.sync_key(CredentialKey::AccessToken).await
    }

    /// Replaces the cached profile without touching either token.
    pub async fn set_user(&self, user: User) -> Result<(), StoreError> {
        self.state.write().await.user = Some(user);
        self.sync_key(CredentialKey::User).await
    }

    /// Forgets every credential, in memory and in every backend.
    pub async fn clear(&self) -> Result<(), StoreError> {
        *self.state.write().await = SessionState::default();
        info!("Session cleared");
        self.sync().await
    }

    /// Writes the in-memory state to every backend: present values are set,
    /// absent ones removed.
    pub async fn sync(&self) -> Result<(), StoreError> {
        for key in CredentialKey::ALL {
            self.sync_key(key).await?;
        }
        Ok(())
    }

    async fn sync_key(&self, key: CredentialKey) -> Result<(), StoreError> {
        let value = self.state.read().await.value(key)?;

        for store in self.stores.iter().filter(|s| s.holds(key)) {
            match &value {
                Some(v) => store.set(key, v).await?,
                None => store.remove(key).await?,
            }
        }
        Ok(())
    }
}
