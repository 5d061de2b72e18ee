use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

/// Loads a JSON document from `path`, or `T::default()` when the file does not exist yet.
pub(super) async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Ok(T::default()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Replaces `path` with `value` as JSON.
///
/// The document goes to a sibling `.tmp` file readable only by the owner and
/// is then renamed over `path`, so readers see either the old or the new
/// document.
pub(super) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source: std::io::Error| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;

    let tmp = temp_path(path);
    let io_err = |source: std::io::Error| StoreError::Io {
        path: tmp.clone(),
        source,
    };

    // A leftover from an interrupted write may carry wider permissions.
    match tokio::fs::remove_file(&tmp).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(io_err(e)),
        _ => {}
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&tmp).await.map_err(io_err)?;
    file.write_all(&bytes).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("store"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_write_replaces_document_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session").join("credentials.json");

        let mut doc = BTreeMap::new();
        doc.insert("token".to_string(), "abc123".to_string());
        write_json(&path, &doc).await.unwrap();
        doc.insert("token".to_string(), "abc456".to_string());
        write_json(&path, &doc).await.unwrap();

        let read: BTreeMap<String, String> = read_json(&path).await.unwrap();
        assert_eq!(read.get("token").map(String::as_str), Some("abc456"));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_stale_temp_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(temp_path(&path), b"{\"token\":").unwrap();

        let doc = BTreeMap::from([("refresh_token".to_string(), "r1".to_string())]);
        write_json(&path, &doc).await.unwrap();

        let read: BTreeMap<String, String> = read_json(&path).await.unwrap();
        assert_eq!(read, doc);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, b"{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let doc = BTreeMap::from([("refresh_token".to_string(), "r1".to_string())]);
        write_json(&path, &doc).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
