//! Redb-backed durable registration store.
//!
//! Claims survive restarts until the runtime clears them at startup, so an
//! operator can inspect which names were held when a process died.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{RegistrationStore, StorageError, StoredRegistration};

/// Table: registrations
/// Key: username (UTF-8)
/// Value: CBOR-encoded StoredRegistration
const REGISTRATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("registrations");

/// Durable registration store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc). Each
/// claim runs in its own write transaction, so two concurrent claims for the
/// same name cannot both succeed.
#[derive(Clone)]
pub struct RedbRegistrations {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbRegistrations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRegistrations").finish_non_exhaustive()
    }
}

impl RedbRegistrations {
    /// Open or create a database at `path`, creating the table if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(REGISTRATIONS).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl RegistrationStore for RedbRegistrations {
    fn claim(&self, username: &str, claimed_at_secs: u64) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut table =
                txn.open_table(REGISTRATIONS).map_err(|e| StorageError::Io(e.to_string()))?;

            if table.get(username).map_err(|e| StorageError::Io(e.to_string()))?.is_some() {
                return Ok(false);
            }

            let mut bytes = Vec::new();
            ciborium::into_writer(&StoredRegistration { claimed_at_secs }, &mut bytes)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            table
                .insert(username, bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(true)
    }

    fn release(&self, username: &str) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        let removed = {
            let mut table =
                txn.open_table(REGISTRATIONS).map_err(|e| StorageError::Io(e.to_string()))?;
            table.remove(username).map_err(|e| StorageError::Io(e.to_string()))?.is_some()
        };

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(removed)
    }

    fn is_registered(&self, username: &str) -> Result<bool, StorageError> {
        Ok(self.registration(username)?.is_some())
    }

    fn registration(&self, username: &str) -> Result<Option<StoredRegistration>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(REGISTRATIONS).map_err(|e| StorageError::Io(e.to_string()))?;

        match table.get(username).map_err(|e| StorageError::Io(e.to_string()))? {
            Some(value) => {
                let record: StoredRegistration = ciborium::from_reader(value.value())
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(record))
            },
            None => Ok(None),
        }
    }

    fn registered(&self) -> Result<Vec<String>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(REGISTRATIONS).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut names = Vec::new();
        for result in table.iter().map_err(|e| StorageError::Io(e.to_string()))? {
            let (key, _) = result.map_err(|e| StorageError::Io(e.to_string()))?;
            names.push(key.value().to_owned());
        }

        Ok(names)
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        let dropped = {
            let mut table =
                txn.open_table(REGISTRATIONS).map_err(|e| StorageError::Io(e.to_string()))?;
            let count = table.len().map_err(|e| StorageError::Io(e.to_string()))?;
            table.retain(|_, _| false).map_err(|e| StorageError::Io(e.to_string()))?;
            usize::try_from(count).unwrap_or(usize::MAX)
        };

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn claim_release_cycle() {
        let dir = tempdir().unwrap();
        let store = RedbRegistrations::open(dir.path().join("names.redb")).unwrap();

        assert!(store.claim("alice", 5).unwrap());
        assert!(!store.claim("alice", 6).unwrap());
        assert_eq!(
            store.registration("alice").unwrap(),
            Some(StoredRegistration { claimed_at_secs: 5 })
        );

        assert!(store.release("alice").unwrap());
        assert!(!store.release("alice").unwrap());
        assert!(!store.is_registered("alice").unwrap());
    }

    #[test]
    fn registered_is_sorted() {
        let dir = tempdir().unwrap();
        let store = RedbRegistrations::open(dir.path().join("names.redb")).unwrap();

        for name in ["carol", "alice", "bob"] {
            store.claim(name, 0).unwrap();
        }

        assert_eq!(store.registered().unwrap(), vec!["alice", "bob", "carol"]);
    }
}
