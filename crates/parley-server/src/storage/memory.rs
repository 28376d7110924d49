use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{RegistrationStore, StorageError, StoredRegistration};

/// In-memory registration store.
///
/// The default when no registrations file is configured, and the store used
/// by tests. Claims vanish with the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistrations {
    inner: Arc<Mutex<BTreeMap<String, StoredRegistration>>>,
}

impl MemoryRegistrations {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, StoredRegistration>>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl RegistrationStore for MemoryRegistrations {
    fn claim(&self, username: &str, claimed_at_secs: u64) -> Result<bool, StorageError> {
        let mut claims = self.lock()?;
        if claims.contains_key(username) {
            return Ok(false);
        }

        claims.insert(username.to_owned(), StoredRegistration { claimed_at_secs });
        Ok(true)
    }

    fn release(&self, username: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.remove(username).is_some())
    }

    fn is_registered(&self, username: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.contains_key(username))
    }

    fn registration(&self, username: &str) -> Result<Option<StoredRegistration>, StorageError> {
        Ok(self.lock()?.get(username).cloned())
    }

    fn registered(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let mut claims = self.lock()?;
        let dropped = claims.len();
        claims.clear();
        Ok(dropped)
    }
}
