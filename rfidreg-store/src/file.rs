//! File-based tag store with write-then-acknowledge persistence.
//!
//! Every mutation writes a full snapshot to disk before it returns.
//! Suitable for single-node deployments where durability is needed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn, Instrument};

use rfidreg_core::constants::{STORE_HEADER_SIZE, STORE_MAGIC, STORE_VERSION};
use rfidreg_core::error::{RegistryError, Result};
use rfidreg_core::traits::TagStore;
use rfidreg_core::types::{TagRecord, TagUid};

use crate::MemoryTagStore;

/// File-based tag store.
///
/// Keeps the working set in a [`MemoryTagStore`]. A mutation first writes
/// the would-be snapshot to disk and only then applies it in memory, so
/// readers never see a record that is not yet durable and a reported
/// success survives a crash.
///
/// Mutations run on their own task. Dropping an `insert` or `remove`
/// future mid-write does not stop it, so memory always ends up matching
/// the file.
///
/// # File Format
///
/// ```text
/// magic (4 bytes): "RFID"
/// version (1 byte): 1
/// count (8 bytes): number of records, little endian
/// records (variable): JSON array of tag records, in insertion order
/// ```
pub struct FileTagStore {
    inner: Arc<Inner>,
}

struct Inner {
    /// Path to the storage file
    path: PathBuf,
    /// In-memory working set
    memory: MemoryTagStore,
    /// Serializes mutations so check, persist and apply happen as one step
    write_lock: Mutex<()>,
}

impl FileTagStore {
    /// Opens the store at the given path.
    ///
    /// If the file exists, it is loaded. Otherwise the store starts empty
    /// and the file is created by the first mutation.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let inner = Inner {
            path: path.as_ref().to_path_buf(),
            memory: MemoryTagStore::new(),
            write_lock: Mutex::new(()),
        };

        if fs::try_exists(&inner.path).await? {
            inner.load().await?;
        }

        Ok(Self { inner: Arc::new(inner) })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns the underlying memory store for direct read access.
    pub fn memory(&self) -> &MemoryTagStore {
        &self.inner.memory
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.inner.memory.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.inner.memory.is_empty()
    }
}

impl Inner {
    /// Loads records from the file.
    #[instrument(skip(self), fields(path = ?self.path))]
    async fn load(&self) -> Result<()> {
        let mut file = fs::File::open(&self.path).await.map_err(|e| {
            RegistryError::StoreUnavailable(format!("failed to open store file: {}", e))
        })?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;

        let records = decode(&contents)?;
        let count = self.memory.import(records).map_err(|e| {
            RegistryError::StoreUnavailable(format!("corrupt store file: {}", e))
        })?;

        info!(count, "Loaded tag records from file");
        Ok(())
    }

    /// Writes `records` to disk atomically (temp file, fsync, rename).
    #[instrument(skip(self, records), fields(path = ?self.path, count = records.len()))]
    async fn persist(&self, records: &[TagRecord]) -> Result<()> {
        let contents = encode(records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;

        debug!("Store file written");
        Ok(())
    }

    async fn persist_or_unavailable(&self, records: &[TagRecord]) -> Result<()> {
        self.persist(records).await.map_err(|e| {
            warn!(error = %e, path = ?self.path, "Failed to persist tag store");
            RegistryError::StoreUnavailable(format!("failed to persist store: {}", e))
        })
    }

    async fn insert(&self, uid: TagUid, username: String, registered_at: DateTime<Utc>) -> Result<TagRecord> {
        let _guard = self.write_lock.lock().await;

        if self.memory.contains(&uid) {
            return Err(RegistryError::DuplicateUid(uid));
        }

        let record = TagRecord::new(uid, &username, registered_at)?;

        let mut snapshot = self.memory.all_records();
        snapshot.push(record.clone());
        self.persist_or_unavailable(&snapshot).await?;

        // Writers are serialized by the guard, so the UID is still absent.
        let record = self.memory.insert_record(record)?;
        info!(uid = %record.uid, username = %record.username, "Tag record persisted");
        Ok(record)
    }

    async fn remove(&self, uid: TagUid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        if !self.memory.contains(&uid) {
            return Ok(false);
        }

        let snapshot: Vec<TagRecord> = self
            .memory
            .all_records()
            .into_iter()
            .filter(|r| r.uid != uid)
            .collect();
        self.persist_or_unavailable(&snapshot).await?;

        self.memory.remove_record(&uid);
        info!(%uid, "Tag record removed");
        Ok(true)
    }
}

/// Awaits a detached mutation task.
async fn join_mutation<T>(task: JoinHandle<Result<T>>) -> Result<T> {
    task.await.map_err(|e| {
        warn!(error = %e, "Store mutation task failed");
        RegistryError::StoreUnavailable(format!("store mutation aborted: {}", e))
    })?
}

fn encode(records: &[TagRecord]) -> Result<Vec<u8>> {
    let serialized = serde_json::to_vec(records)?;

    let mut contents = Vec::with_capacity(STORE_HEADER_SIZE + serialized.len());
    contents.extend_from_slice(STORE_MAGIC);
    contents.push(STORE_VERSION);
    contents.extend_from_slice(&(records.len() as u64).to_le_bytes());
    contents.extend_from_slice(&serialized);
    Ok(contents)
}

fn decode(contents: &[u8]) -> Result<Vec<TagRecord>> {
    if contents.len() < STORE_HEADER_SIZE {
        return Err(RegistryError::StoreUnavailable("store file too short".into()));
    }

    if &contents[0..4] != STORE_MAGIC {
        return Err(RegistryError::StoreUnavailable("invalid magic bytes".into()));
    }

    let version = contents[4];
    if version != STORE_VERSION {
        return Err(RegistryError::VersionMismatch {
            expected: STORE_VERSION,
            actual: version,
        });
    }

    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&contents[5..STORE_HEADER_SIZE]);
    let count = u64::from_le_bytes(count_bytes);

    let records: Vec<TagRecord> = serde_json::from_slice(&contents[STORE_HEADER_SIZE..])
        .map_err(|e| RegistryError::StoreUnavailable(format!("corrupt store file: {}", e)))?;

    if records.len() as u64 != count {
        return Err(RegistryError::StoreUnavailable(format!(
            "record count mismatch: header says {}, found {}",
            count,
            records.len()
        )));
    }

    Ok(records)
}

#[async_trait]
impl TagStore for FileTagStore {
    async fn list(&self) -> Result<Vec<TagRecord>> {
        self.inner.memory.list().await
    }

    #[instrument(skip(self, registered_at))]
    async fn insert(
        &self,
        uid: TagUid,
        username: &str,
        registered_at: DateTime<Utc>,
    ) -> Result<TagRecord> {
        let inner = self.inner.clone();
        let username = username.to_string();
        let task = tokio::spawn(
            async move { inner.insert(uid, username, registered_at).await }.in_current_span(),
        );
        join_mutation(task).await
    }

    #[instrument(skip(self))]
    async fn remove(&self, uid: &TagUid) -> Result<bool> {
        let inner = self.inner.clone();
        let uid = uid.clone();
        let task = tokio::spawn(async move { inner.remove(uid).await }.in_current_span());
        join_mutation(task).await
    }

    async fn get(&self, uid: &TagUid) -> Result<Option<TagRecord>> {
        self.inner.memory.get(uid).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.memory.count().await
    }
}
