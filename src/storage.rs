//! Persistence for the license record.
//!
//! [`FileStore`] keeps the record as AES-256-GCM encrypted JSON in the
//! platform data directory:
//!
//! - Windows: `%APPDATA%\netviper-pos\license.enc`
//! - macOS: `~/Library/Application Support/netviper-pos/license.enc`
//! - Linux: `~/.local/share/netviper-pos/license.enc`
//!
//! [`MemoryStore`] keeps it in memory, for tests and embedding.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::encryption::{decrypt_bytes, derive_key, encrypt_bytes, KEY_SIZE};
use crate::errors::LicenseResult;
use crate::record::LicenseRecord;

/// Where the manager keeps its record.
///
/// `load` returns `Ok(None)` when nothing was stored yet and an error when
/// something was stored but cannot be read back.
pub trait LicenseStore: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = LicenseResult<Option<LicenseRecord>>> + Send;

    fn save(&self, record: &LicenseRecord) -> impl Future<Output = LicenseResult<()>> + Send;

    fn clear(&self) -> impl Future<Output = LicenseResult<()>> + Send;
}

impl<S: LicenseStore> LicenseStore for Arc<S> {
    fn load(&self) -> impl Future<Output = LicenseResult<Option<LicenseRecord>>> + Send {
        (**self).load()
    }

    fn save(&self, record: &LicenseRecord) -> impl Future<Output = LicenseResult<()>> + Send {
        (**self).save(record)
    }

    fn clear(&self) -> impl Future<Output = LicenseResult<()>> + Send {
        (**self).clear()
    }
}

/// Encrypted single-file store.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileStore {
    /// Store at `path`, encrypted for this device and product.
    pub fn new(path: impl Into<PathBuf>, device_fingerprint: &str, product_code: &str) -> Self {
        Self {
            path: path.into(),
            key: derive_key(device_fingerprint, product_code),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LicenseStore for FileStore {
    async fn load(&self) -> LicenseResult<Option<LicenseRecord>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let plaintext = decrypt_bytes(&bytes, &self.key)?;
        let record = serde_json::from_slice(&plaintext)?;
        Ok(Some(record))
    }

    async fn save(&self, record: &LicenseRecord) -> LicenseResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let json = serde_json::to_vec(record)?;
        let encrypted = encrypt_bytes(&json, &self.key)?;

        // Write-then-rename so a crash never leaves a half-written record.
        let tmp = self.temp_path();
        fs::write(&tmp, encrypted).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), "license record saved");
        Ok(())
    }

    async fn clear(&self) -> LicenseResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "license record removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<LicenseRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: LicenseRecord) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(record))),
        }
    }

    /// Current contents, bypassing the trait.
    pub async fn snapshot(&self) -> Option<LicenseRecord> {
        self.slot.lock().await.clone()
    }
}

impl LicenseStore for MemoryStore {
    async fn load(&self) -> LicenseResult<Option<LicenseRecord>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, record: &LicenseRecord) -> LicenseResult<()> {
        *self.slot.lock().await = Some(record.clone());
        Ok(())
    }

    async fn clear(&self) -> LicenseResult<()> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        let record = LicenseRecord::new_trial(Utc::now(), 30, "fp");
        store.save(&record).await.unwrap();

        let shared = store.clone();
        assert_eq!(shared.load().await.unwrap(), Some(record));

        shared.clear().await.unwrap();
        assert!(store.snapshot().await.is_none());
    }

    #[test]
    fn temp_path_sits_next_to_record() {
        let store = FileStore::new("/data/pos/license.enc", "fp", "pos");
        assert_eq!(store.temp_path(), PathBuf::from("/data/pos/license.enc.tmp"));
    }

    #[test]
    fn debug_hides_key() {
        let store = FileStore::new("license.enc", "fp", "pos");
        let text = format!("{store:?}");
        assert!(text.contains("license.enc"));
        assert!(!text.contains("key"));
    }
}
