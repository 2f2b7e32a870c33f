//! In-memory tag store.
//!
//! Fast, thread-safe storage suitable for development, testing,
//! and as the working set of the file store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, instrument};

use rfidreg_core::error::{RegistryError, Result};
use rfidreg_core::traits::TagStore;
use rfidreg_core::types::{TagRecord, TagUid};

#[derive(Debug, Default)]
struct Entries {
    /// Insertion sequence → record
    records: BTreeMap<u64, TagRecord>,
    /// UID → insertion sequence
    by_uid: HashMap<TagUid, u64>,
    /// Next insertion sequence
    next_seq: u64,
}

/// In-memory tag store.
///
/// # Ordering
///
/// Records are listed in insertion order. Each record carries an insertion
/// sequence number; the UID index points into it.
///
/// # Thread Safety
///
/// A single lock covers both maps, so the duplicate check and the insert
/// happen atomically and readers always see a complete snapshot.
#[derive(Debug, Default)]
pub struct MemoryTagStore {
    entries: RwLock<Entries>,
}

impl MemoryTagStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.entries.read().by_uid.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().by_uid.is_empty()
    }

    /// Returns true if a record for `uid` exists.
    pub fn contains(&self, uid: &TagUid) -> bool {
        self.entries.read().by_uid.contains_key(uid)
    }

    /// Clears all records.
    pub fn clear(&self) {
        *self.entries.write() = Entries::default();
    }

    /// Returns all records in insertion order (for export/backup).
    pub fn all_records(&self) -> Vec<TagRecord> {
        self.entries.read().records.values().cloned().collect()
    }

    /// Imports records, keeping their order.
    ///
    /// Used when restoring from a file. Fails on the first duplicate UID;
    /// records before it stay imported.
    pub fn import(&self, records: Vec<TagRecord>) -> Result<usize> {
        let mut imported = 0;
        for record in records {
            self.insert_record(record)?;
            imported += 1;
        }
        Ok(imported)
    }

    /// Atomic insert-if-absent.
    pub(crate) fn insert_record(&self, record: TagRecord) -> Result<TagRecord> {
        let mut entries = self.entries.write();

        if entries.by_uid.contains_key(&record.uid) {
            return Err(RegistryError::DuplicateUid(record.uid));
        }

        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.by_uid.insert(record.uid.clone(), seq);
        entries.records.insert(seq, record.clone());

        Ok(record)
    }

    pub(crate) fn remove_record(&self, uid: &TagUid) -> Option<TagRecord> {
        let mut entries = self.entries.write();
        let seq = entries.by_uid.remove(uid)?;
        entries.records.remove(&seq)
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<TagRecord>> {
        Ok(self.all_records())
    }

    /// Binds a UID to a username.
    ///
    /// The username is validated and the timestamp truncated to seconds.
    #[instrument(skip(self, registered_at))]
    async fn insert(
        &self,
        uid: TagUid,
        username: &str,
        registered_at: DateTime<Utc>,
    ) -> Result<TagRecord> {
        let record = TagRecord::new(uid, username, registered_at)?;
        let record = self.insert_record(record)?;

        debug!(uid = %record.uid, username = %record.username, "Tag record stored");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn remove(&self, uid: &TagUid) -> Result<bool> {
        let removed = self.remove_record(uid).is_some();
        debug!(%uid, removed, "Tag record removal");
        Ok(removed)
    }

    async fn get(&self, uid: &TagUid) -> Result<Option<TagRecord>> {
        let entries = self.entries.read();
        Ok(entries
            .by_uid
            .get(uid)
            .and_then(|seq| entries.records.get(seq))
            .cloned())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rfidreg_core::types::server_timestamp;

    fn uid(s: &str) -> TagUid {
        TagUid::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryTagStore::new();

        let record = store.insert(uid("TAG1"), "alice", server_timestamp()).await.unwrap();
        assert_eq!(record.username, "alice");

        let retrieved = store.get(&uid("TAG1")).await.unwrap().unwrap();
        assert_eq!(retrieved, record);
        assert!(store.get(&uid("TAG2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_uid_rejected_without_overwrite() {
        let store = MemoryTagStore::new();
        store.insert(uid("TAG1"), "alice", server_timestamp()).await.unwrap();

        let err = store.insert(uid("TAG1"), "bob", server_timestamp()).await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateUid(ref u) if *u == uid("TAG1")));

        let kept = store.get(&uid("TAG1")).await.unwrap().unwrap();
        assert_eq!(kept.username, "alice");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_username_rejected() {
        let store = MemoryTagStore::new();
        let result = store.insert(uid("TAG1"), "   ", server_timestamp()).await;
        assert!(matches!(result, Err(RegistryError::InvalidInput(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_insertion_ordered() {
        let store = MemoryTagStore::new();
        for (u, name) in [("C", "carol"), ("A", "alice"), ("B", "bob")] {
            store.insert(uid(u), name, server_timestamp()).await.unwrap();
        }
        store.remove(&uid("A")).await.unwrap();
        store.insert(uid("A"), "alice", server_timestamp()).await.unwrap();

        let uids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.uid.to_string())
            .collect();
        assert_eq!(uids, ["C", "B", "A"]);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemoryTagStore::new();
        store.insert(uid("TAG1"), "alice", server_timestamp()).await.unwrap();

        assert!(store.remove(&uid("TAG1")).await.unwrap());
        assert!(!store.remove(&uid("TAG1")).await.unwrap());
        assert!(!store.remove(&uid("NEVER")).await.unwrap());
        assert!(!store.remove(&uid("NEVER")).await.unwrap());
    }

    #[tokio::test]
    async fn test_import_export() {
        let store1 = MemoryTagStore::new();
        store1.insert(uid("A"), "alice", server_timestamp()).await.unwrap();
        store1.insert(uid("B"), "bob", server_timestamp()).await.unwrap();

        let records = store1.all_records();
        let store2 = MemoryTagStore::new();
        assert_eq!(store2.import(records.clone()).unwrap(), 2);
        assert_eq!(store2.all_records(), records);

        // Re-importing collides
        assert!(store2.import(records).is_err());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryTagStore::new();
        store.insert(uid("A"), "alice", server_timestamp()).await.unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(!store.contains(&uid("A")));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_of_same_uid() {
        use std::sync::Arc;
        use tokio::task::JoinSet;

        let store = Arc::new(MemoryTagStore::new());
        let mut tasks = JoinSet::new();

        for i in 0..50 {
            let store = store.clone();
            tasks.spawn(async move {
                store
                    .insert(TagUid::new("SHARED").unwrap(), &format!("user{}", i), server_timestamp())
                    .await
                    .is_ok()
            });
        }

        let mut successes = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(store.len(), 1);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Insert(u8, u8),
        Remove(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8, 0u8..4).prop_map(|(u, n)| Op::Insert(u, n)),
            (0u8..8).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_uids_stay_unique(ops in proptest::collection::vec(op(), 0..64)) {
            let store = MemoryTagStore::new();
            let mut model: Vec<(String, String)> = Vec::new();

            for op in ops {
                match op {
                    Op::Insert(u, n) => {
                        let key = format!("T{}", u);
                        let name = format!("user{}", n);
                        let record = TagRecord::new(TagUid::new(&key).unwrap(), &name, server_timestamp()).unwrap();
                        let inserted = store.insert_record(record).is_ok();
                        let expected = !model.iter().any(|(k, _)| *k == key);
                        prop_assert_eq!(inserted, expected);
                        if expected {
                            model.push((key, name));
                        }
                    }
                    Op::Remove(u) => {
                        let key = format!("T{}", u);
                        let removed = store.remove_record(&TagUid::new(&key).unwrap()).is_some();
                        let before = model.len();
                        model.retain(|(k, _)| *k != key);
                        prop_assert_eq!(removed, model.len() != before);
                    }
                }
            }

            let listed: Vec<(String, String)> = store
                .all_records()
                .into_iter()
                .map(|r| (r.uid.to_string(), r.username))
                .collect();
            prop_assert_eq!(listed, model);
        }
    }
}
