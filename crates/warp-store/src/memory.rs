// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! In-memory object-store backend.
//!
//! [`MemoryStore`] keeps blobs, commits, and refs in maps behind one
//! `tokio::sync::RwLock`. Ref updates take the write lock for the whole
//! read-compare-swap, which gives the compare-and-set semantics the trait
//! requires. Suitable for tests and single-process use; a durable backend
//! (an actual git object database, or any content-addressed service) plugs
//! in behind the same trait.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use blake3::Hasher;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{
    blob_id, CommitInfo, ObjectId, ObjectStore, PingReport, RefCas, RefEntry, StoreError,
};

#[derive(Debug, Clone)]
struct CommitRecord {
    message: Bytes,
    parents: Vec<ObjectId>,
    author: String,
    date_epoch_ms: u64,
}

#[derive(Default)]
struct Inner {
    blobs: HashMap<ObjectId, Bytes>,
    commits: HashMap<ObjectId, CommitRecord>,
    // BTreeMap so that list_refs comes back sorted without an extra pass.
    refs: BTreeMap<String, ObjectId>,
}

/// In-memory [`ObjectStore`] backend.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    author: String,
}

impl MemoryStore {
    /// Create an empty store with a default author string.
    pub fn new() -> Self {
        Self::with_author("warp-store")
    }

    /// Create an empty store stamping commits with `author`.
    pub fn with_author(author: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            author: author.into(),
        }
    }

    /// Number of blobs currently stored.
    pub async fn blob_count(&self) -> usize {
        self.inner.read().await.blobs.len()
    }

    /// Number of commit objects currently stored.
    pub async fn commit_count(&self) -> usize {
        self.inner.read().await.commits.len()
    }

    fn now_epoch_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    /// Commit ids are domain-separated and length-framed so that a commit can
    /// never collide with the blob of its own payload.
    fn commit_id(record: &CommitRecord) -> ObjectId {
        let mut hasher = Hasher::new();
        hasher.update(b"commit:");
        hasher.update(&(record.message.len() as u64).to_le_bytes());
        hasher.update(&record.message);
        hasher.update(&(record.parents.len() as u64).to_le_bytes());
        for parent in &record.parents {
            hasher.update(parent.as_bytes());
        }
        hasher.update(&(record.author.len() as u64).to_le_bytes());
        hasher.update(record.author.as_bytes());
        hasher.update(&record.date_epoch_ms.to_le_bytes());
        ObjectId(*hasher.finalize().as_bytes())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn write_blob(&self, bytes: Bytes) -> Result<ObjectId, StoreError> {
        let id = blob_id(&bytes);
        let mut inner = self.inner.write().await;
        inner.blobs.entry(id).or_insert(bytes);
        Ok(id)
    }

    async fn read_blob(&self, id: ObjectId) -> Result<Bytes, StoreError> {
        let inner = self.inner.read().await;
        if let Some(bytes) = inner.blobs.get(&id) {
            return Ok(bytes.clone());
        }
        if inner.commits.contains_key(&id) {
            return Err(StoreError::WrongKind {
                id,
                expected: "blob",
            });
        }
        Err(StoreError::MissingObject(id))
    }

    async fn commit(&self, message: Bytes, parents: &[ObjectId]) -> Result<ObjectId, StoreError> {
        let mut inner = self.inner.write().await;
        for parent in parents {
            if !inner.commits.contains_key(parent) {
                return Err(StoreError::MissingObject(*parent));
            }
        }
        let record = CommitRecord {
            message,
            parents: parents.to_vec(),
            author: self.author.clone(),
            date_epoch_ms: Self::now_epoch_ms(),
        };
        let id = Self::commit_id(&record);
        inner.commits.entry(id).or_insert(record);
        Ok(id)
    }

    async fn show_commit(&self, id: ObjectId) -> Result<Bytes, StoreError> {
        Ok(self.commit_info(id).await?.message)
    }

    async fn commit_info(&self, id: ObjectId) -> Result<CommitInfo, StoreError> {
        let inner = self.inner.read().await;
        let Some(record) = inner.commits.get(&id) else {
            if inner.blobs.contains_key(&id) {
                return Err(StoreError::WrongKind {
                    id,
                    expected: "commit",
                });
            }
            return Err(StoreError::MissingObject(id));
        };
        Ok(CommitInfo {
            message: record.message.clone(),
            parents: record.parents.clone(),
            author: record.author.clone(),
            date_epoch_ms: record.date_epoch_ms,
        })
    }

    async fn update_ref(
        &self,
        name: &str,
        target: ObjectId,
        expect: RefCas,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let current = inner.refs.get(name).copied();
        let ok = match expect {
            RefCas::Any => true,
            RefCas::Absent => current.is_none(),
            RefCas::At(id) => current == Some(id),
        };
        if !ok {
            return Err(StoreError::RefConflict(name.to_owned()));
        }
        inner.refs.insert(name.to_owned(), target);
        Ok(())
    }

    async fn read_ref(&self, name: &str) -> Result<Option<ObjectId>, StoreError> {
        Ok(self.inner.read().await.refs.get(name).copied())
    }

    async fn list_refs(&self, prefix: &str) -> Result<Vec<RefEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .refs
            .range(prefix.to_owned()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, target)| RefEntry {
                name: name.clone(),
                target: *target,
            })
            .collect())
    }

    async fn delete_ref(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.refs.remove(name).is_none() {
            return Err(StoreError::MissingRef(name.to_owned()));
        }
        Ok(())
    }

    async fn count_reachable(&self, name: &str) -> Result<u64, StoreError> {
        let inner = self.inner.read().await;
        let Some(head) = inner.refs.get(name).copied() else {
            return Err(StoreError::MissingRef(name.to_owned()));
        };
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack = vec![head];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(record) = inner.commits.get(&id) else {
                return Err(StoreError::MissingObject(id));
            };
            stack.extend(record.parents.iter().copied());
        }
        Ok(seen.len() as u64)
    }

    async fn ping(&self) -> Result<PingReport, StoreError> {
        let started = Instant::now();
        let _guard = self.inner.read().await;
        Ok(PingReport {
            ok: true,
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. blob round-trip and idempotence ───────────────────────────────

    #[tokio::test]
    async fn blob_round_trip() {
        let store = MemoryStore::new();
        let id = store.write_blob(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(id, blob_id(b"hello"));
        let got = store.read_blob(id).await.unwrap();
        assert_eq!(&got[..], b"hello");

        let again = store.write_blob(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(id, again);
        assert_eq!(store.blob_count().await, 1);
    }

    // ── 2. commit chains record parents ──────────────────────────────────

    #[tokio::test]
    async fn commit_chain_parents() {
        let store = MemoryStore::new();
        let first = store.commit(Bytes::from_static(b"p1"), &[]).await.unwrap();
        let second = store
            .commit(Bytes::from_static(b"p2"), &[first])
            .await
            .unwrap();
        let info = store.commit_info(second).await.unwrap();
        assert_eq!(info.parents, vec![first]);
        assert_eq!(&info.message[..], b"p2");
        assert_eq!(&store.show_commit(first).await.unwrap()[..], b"p1");
    }

    // ── 3. commit with a missing parent is rejected ──────────────────────

    #[tokio::test]
    async fn commit_missing_parent_rejected() {
        let store = MemoryStore::new();
        let ghost = ObjectId([9; 32]);
        let err = store
            .commit(Bytes::from_static(b"x"), &[ghost])
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::MissingObject(ghost));
    }

    // ── 4. commit/blob id domains do not collide ─────────────────────────

    #[tokio::test]
    async fn commit_id_differs_from_payload_blob_id() {
        let store = MemoryStore::new();
        let payload = Bytes::from_static(b"same bytes");
        let blob = store.write_blob(payload.clone()).await.unwrap();
        let commit = store.commit(payload, &[]).await.unwrap();
        assert_ne!(blob, commit);
    }

    // ── 5. ref CAS semantics ─────────────────────────────────────────────

    #[tokio::test]
    async fn ref_cas_expectations() {
        let store = MemoryStore::new();
        let a = store.commit(Bytes::from_static(b"a"), &[]).await.unwrap();
        let b = store.commit(Bytes::from_static(b"b"), &[a]).await.unwrap();

        store.update_ref("r/head", a, RefCas::Absent).await.unwrap();
        // Absent now fails.
        assert_eq!(
            store.update_ref("r/head", b, RefCas::Absent).await,
            Err(StoreError::RefConflict("r/head".into()))
        );
        // Wrong expected head fails.
        assert_eq!(
            store.update_ref("r/head", b, RefCas::At(b)).await,
            Err(StoreError::RefConflict("r/head".into()))
        );
        // Correct expected head succeeds.
        store.update_ref("r/head", b, RefCas::At(a)).await.unwrap();
        assert_eq!(store.read_ref("r/head").await.unwrap(), Some(b));
    }

    // ── 6. list_refs honors prefix and sorts ─────────────────────────────

    #[tokio::test]
    async fn list_refs_prefix_and_order() {
        let store = MemoryStore::new();
        let c = store.commit(Bytes::from_static(b"c"), &[]).await.unwrap();
        for name in ["warp/g/writers/bob", "warp/g/writers/alice", "warp/other"] {
            store.update_ref(name, c, RefCas::Any).await.unwrap();
        }
        let listed = store.list_refs("warp/g/writers/").await.unwrap();
        let names: Vec<&str> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["warp/g/writers/alice", "warp/g/writers/bob"]);
    }

    // ── 7. delete_ref on missing ref errors ──────────────────────────────

    #[tokio::test]
    async fn delete_missing_ref_errors() {
        let store = MemoryStore::new();
        assert_eq!(
            store.delete_ref("no/such").await,
            Err(StoreError::MissingRef("no/such".into()))
        );
    }

    // ── 8. count_reachable walks the whole chain ─────────────────────────

    #[tokio::test]
    async fn count_reachable_chain() {
        let store = MemoryStore::new();
        let mut head = store.commit(Bytes::from_static(b"0"), &[]).await.unwrap();
        for i in 1..5u8 {
            head = store
                .commit(Bytes::copy_from_slice(&[i]), &[head])
                .await
                .unwrap();
        }
        store.update_ref("r", head, RefCas::Any).await.unwrap();
        assert_eq!(store.count_reachable("r").await.unwrap(), 5);
    }

    // ── 9. wrong-kind reads are loud ─────────────────────────────────────

    #[tokio::test]
    async fn wrong_kind_reads() {
        let store = MemoryStore::new();
        let blob = store.write_blob(Bytes::from_static(b"x")).await.unwrap();
        let commit = store.commit(Bytes::from_static(b"y"), &[]).await.unwrap();
        assert!(matches!(
            store.commit_info(blob).await,
            Err(StoreError::WrongKind { expected: "commit", .. })
        ));
        assert!(matches!(
            store.read_blob(commit).await,
            Err(StoreError::WrongKind { expected: "blob", .. })
        ));
    }

    // ── 10. ping reports health ──────────────────────────────────────────

    #[tokio::test]
    async fn ping_reports_ok() {
        let store = MemoryStore::new();
        let report = store.ping().await.unwrap();
        assert!(report.ok);
    }

    // ── 11. object id hex round-trip ─────────────────────────────────────

    #[test]
    fn object_id_hex_round_trip() {
        let id = ObjectId([0xab; 32]);
        let hexed = id.to_string();
        assert_eq!(hexed.len(), 64);
        assert_eq!(ObjectId::from_hex(&hexed).unwrap(), id);
        assert!(ObjectId::from_hex("zz").is_err());
    }
}
