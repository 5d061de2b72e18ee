use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use super::file::{read_json, write_json};
use super::{CredentialKey, CredentialStore};
use crate::error::StoreError;

pub const DEFAULT_COOKIE_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Cookie {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Cookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Short-lived store mirroring what request preprocessing needs: the access
/// token and the cached profile. The refresh token never goes here.
///
/// Every write restarts the entry's expiry; expired entries read as absent.
pub struct CookieStore {
    path: Option<PathBuf>,
    ttl: TimeDelta,
    jar: Mutex<BTreeMap<String, Cookie>>,
}

impl CookieStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            ttl: TimeDelta::days(DEFAULT_COOKIE_TTL_DAYS),
            jar: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let jar: BTreeMap<String, Cookie> = read_json(&path).await?;
        debug!(path = %path.display(), cookies = jar.len(), "Opened cookie store");

        Ok(Self {
            path: Some(path),
            ttl: TimeDelta::days(DEFAULT_COOKIE_TTL_DAYS),
            jar: Mutex::new(jar),
        })
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    /// Expiry of the cookie stored under `key`, if any.
    pub async fn expires_at(&self, key: CredentialKey) -> Option<DateTime<Utc>> {
        self.jar
            .lock()
            .await
            .get(key.as_str())
            .map(|cookie| cookie.expires_at)
    }

    async fn persist(&self, jar: &BTreeMap<String, Cookie>) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => write_json(path, jar).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CredentialStore for CookieStore {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn holds(&self, key: CredentialKey) -> bool {
        matches!(key, CredentialKey::AccessToken | CredentialKey::User)
    }

    async fn get(&self, key: CredentialKey) -> Result<Option<String>, StoreError> {
        let mut jar = self.jar.lock().await;

        let Some(cookie) = jar.get(key.as_str()) else {
            return Ok(None);
        };
        if !cookie.is_expired(Utc::now()) {
            return Ok(Some(cookie.value.clone()));
        }

        debug!(key = key.as_str(), "Dropping expired cookie");
        jar.remove(key.as_str());
        self.persist(&jar).await?;
        Ok(None)
    }

    async fn set(&self, key: CredentialKey, value: &str) -> Result<(), StoreError> {
        if !self.holds(key) {
            return Ok(());
        }

        let mut jar = self.jar.lock().await;
        jar.insert(
            key.as_str().to_string(),
            Cookie {
                value: value.to_string(),
                expires_at: Utc::now() + self.ttl,
            },
        );
        self.persist(&jar).await
    }

    async fn remove(&self, key: CredentialKey) -> Result<(), StoreError> {
        let mut jar = self.jar.lock().await;
        if jar.remove(key.as_str()).is_some() {
            self.persist(&jar).await?;
        }
        Ok(())
    }
}
