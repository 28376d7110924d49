//! Registration store behaviour shared by the memory and redb backends.

use parley_server::{MemoryRegistrations, RedbRegistrations, RegistrationStore};
use tempfile::tempdir;

fn exercise(store: &impl RegistrationStore) {
    assert!(store.claim("alice", 100).unwrap());
    assert!(store.claim("bob", 101).unwrap());
    assert!(!store.claim("alice", 102).unwrap(), "second claim must fail");

    assert_eq!(store.registration("alice").unwrap().unwrap().claimed_at_secs, 100);
    assert_eq!(store.registered().unwrap(), vec!["alice", "bob"]);

    assert!(store.release("alice").unwrap());
    assert!(!store.is_registered("alice").unwrap());
    assert!(store.claim("alice", 103).unwrap(), "released name can be claimed again");

    assert_eq!(store.clear().unwrap(), 2);
    assert!(store.registered().unwrap().is_empty());
}

#[test]
fn memory_store() {
    exercise(&MemoryRegistrations::new());
}

#[test]
fn redb_store() {
    let dir = tempdir().unwrap();
    exercise(&RedbRegistrations::open(dir.path().join("names.redb")).unwrap());
}

#[test]
fn redb_claims_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("names.redb");

    {
        let store = RedbRegistrations::open(&path).unwrap();
        store.claim("carol", 7).unwrap();
    }

    let store = RedbRegistrations::open(&path).unwrap();
    assert!(store.is_registered("carol").unwrap());
    assert!(!store.claim("carol", 8).unwrap());

    // What the runtime does at startup.
    assert_eq!(store.clear().unwrap(), 1);
    assert!(store.claim("carol", 9).unwrap());
}

#[test]
fn concurrent_claims_have_one_winner() {
    let store = MemoryRegistrations::new();

    let winners: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                scope.spawn(move || store.claim("dave", i).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| usize::from(h.join().unwrap())).sum()
    });

    assert_eq!(winners, 1);
}
