use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use super::file::{read_json, write_json};
use super::{CredentialKey, CredentialStore};
use crate::error::StoreError;

/// Long-lived key-value store holding every credential key.
///
/// Persisted as a flat JSON object:
/// ```json
/// {
///   "refresh_token": "eyJhbGciOi...",
///   "token": "eyJhbGciOi...",
///   "user": "{\"id\":7,\"username\":\"awa\"}"
/// }
/// ```
/// Without a path the entries only live as long as the process.
pub struct DurableStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl DurableStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Opens the store backed by the JSON file at `path`, creating it on first write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries: BTreeMap<String, String> = read_json(&path).await?;
        debug!(path = %path.display(), keys = entries.len(), "Opened durable credential store");

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => write_json(path, entries).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CredentialStore for DurableStore {
    fn name(&self) -> &'static str {
        "durable"
    }

    async fn get(&self, key: CredentialKey) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key.as_str()).cloned())
    }

    async fn set(&self, key: CredentialKey, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.as_str().to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn remove(&self, key: CredentialKey) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key.as_str()).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}
