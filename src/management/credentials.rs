use async_trait::async_trait;
use keyring::Entry;
use parking_lot::Mutex;

use crate::error::StorageError;

/// Service identifier every credential entry is scoped by.
pub const CREDENTIAL_SERVICE: &str = "tunectl.spotify";
pub const CREDENTIAL_ACCOUNT: &str = "authorization";

/// Secure persistence of the serialized authorization bundle.
///
/// Implementations treat the blob as opaque bytes and never log it. `load`
/// reports absence as `Ok(None)`; `delete` succeeds when nothing is stored.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Replaces any stored blob.
    async fn save(&self, blob: &[u8]) -> Result<(), StorageError>;

    async fn load(&self) -> Result<Option<Vec<u8>>, StorageError>;

    async fn delete(&self) -> Result<(), StorageError>;
}

/// Platform keychain (macOS Keychain, Windows Credential Manager, Linux
/// kernel keyring) via `keyring`.
pub struct KeyringCredentialStore {
    service: String,
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(service: &str, account: &str) -> Result<Entry, keyring::Error> {
        Entry::new(service, account)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, String> + Send + 'static,
    {
        let service = self.service.clone();
        let account = self.account.clone();
        tokio::task::spawn_blocking(move || {
            let entry = Self::entry(&service, &account).map_err(|e| e.to_string())?;
            op(entry)
        })
        .await
        .map_err(|e| e.to_string())?
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(CREDENTIAL_SERVICE, CREDENTIAL_ACCOUNT)
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn save(&self, blob: &[u8]) -> Result<(), StorageError> {
        let blob = blob.to_vec();
        self.blocking(move |entry| {
            // delete-then-insert, never two entries for the service
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(e.to_string()),
            }
            entry.set_secret(&blob).map_err(|e| e.to_string())
        })
        .await
        .map_err(StorageError::SaveFailed)
    }

    async fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        self.blocking(|entry| match entry.get_secret() {
            Ok(blob) => Ok(Some(blob)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.to_string()),
        })
        .await
        .map_err(StorageError::LoadFailed)
    }

    async fn delete(&self) -> Result<(), StorageError> {
        self.blocking(|entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.to_string()),
        })
        .await
        .map_err(StorageError::DeleteFailed)
    }
}

/// Process-local store, for tests and for running without a keychain.
#[derive(Default)]
pub struct MemoryCredentialStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(Some(blob)),
        }
    }

    pub fn contains(&self) -> bool {
        self.blob.lock().is_some()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn save(&self, blob: &[u8]) -> Result<(), StorageError> {
        *self.blob.lock() = Some(blob.to_vec());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blob.lock().clone())
    }

    async fn delete(&self) -> Result<(), StorageError> {
        self.blob.lock().take();
        Ok(())
    }
}
