//! Mock registry.
//!
//! Append-only: mocks are inserted once and never change or disappear, so a
//! reader only ever sees the set grow.

use crate::error::MockError;
use crate::mapping::StoredMock;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Storage for registered mocks.
pub trait MockStore: Send + Sync {
    /// Store a mock. Fails if its id is already taken.
    ///
    /// The store sets [`StoredMock::sequence`]: sequences increase in the
    /// order mocks become visible to [`MockStore::scan_all`].
    fn insert(&self, mock: StoredMock) -> Result<Arc<StoredMock>, MockError>;

    /// Every stored mock, in no particular order.
    fn scan_all(&self) -> Vec<Arc<StoredMock>>;

    fn len(&self) -> usize {
        self.scan_all().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct Entries {
    mocks: Vec<Arc<StoredMock>>,
    ids: HashSet<String>,
    next_sequence: u64,
}

/// In-process store kept in registration order.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<Entries>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MockStore for InMemoryStore {
    fn insert(&self, mut mock: StoredMock) -> Result<Arc<StoredMock>, MockError> {
        let mut entries = self.entries.write();
        if !entries.ids.insert(mock.id.clone()) {
            return Err(MockError::invalid(format!(
                "the mock id {} is already registered.",
                mock.id
            )));
        }
        mock.sequence = entries.next_sequence;
        entries.next_sequence += 1;

        let mock = Arc::new(mock);
        entries.mocks.push(Arc::clone(&mock));
        debug!(
            mock_id = %mock.id,
            sequence = mock.sequence,
            total = entries.mocks.len(),
            "mock stored"
        );
        Ok(mock)
    }

    fn scan_all(&self) -> Vec<Arc<StoredMock>> {
        self.entries.read().mocks.clone()
    }

    fn len(&self) -> usize {
        self.entries.read().mocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ResponseSpec;
    use crate::matcher::RequestMatcher;
    use std::thread;

    fn mock(id: &str) -> StoredMock {
        StoredMock {
            id: id.to_string(),
            sequence: 0,
            request: RequestMatcher::default(),
            response: ResponseSpec::default(),
        }
    }

    #[test]
    fn test_insert_and_scan() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());

        store.insert(mock("a")).unwrap();
        store.insert(mock("b")).unwrap();

        let ids: Vec<_> = store.scan_all().iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let sequences: Vec<_> = store.scan_all().iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = InMemoryStore::new();
        store.insert(mock("same")).unwrap();
        let err = store.insert(mock("same")).unwrap_err();
        assert!(matches!(err, MockError::InvalidRequest(ref cause) if cause.contains("same")));
        assert_eq!(store.len(), 1);

        // A rejected insert does not use up a sequence number.
        assert_eq!(store.insert(mock("other")).unwrap().sequence, 1);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_inserts() {
        let store = InMemoryStore::new();
        store.insert(mock("a")).unwrap();
        let snapshot = store.scan_all();
        store.insert(mock("b")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.scan_all().len(), 2);
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        store.insert(mock(&format!("{}-{}", t, i))).unwrap();
                        assert!(!store.scan_all().is_empty());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 400);
    }

    #[test]
    fn test_concurrent_sequences_follow_visibility_order() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        let stored = store.insert(mock(&format!("{}-{}", t, i))).unwrap();
                        // Everything already visible was registered earlier.
                        let scan = store.scan_all();
                        let position = scan.iter().position(|m| m.id == stored.id).unwrap();
                        assert!(scan[..position].iter().all(|m| m.sequence < stored.sequence));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sequences: Vec<_> = store.scan_all().iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, (0..400).collect::<Vec<u64>>());
    }
}
