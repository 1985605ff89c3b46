// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Content-addressed object-store port for WarpGraph.
//!
//! `warp-store` defines the [`ObjectStore`] trait — the only surface through
//! which the graph engine touches durable storage — plus the in-memory
//! backend used by tests and single-process deployments. The model is the
//! one distributed source-control systems use:
//!
//! - **blobs**: immutable byte sequences addressed by content hash;
//! - **commits**: immutable objects carrying a payload and parent links,
//!   forming per-writer chains;
//! - **refs**: named, movable pointers updated under compare-and-set.
//!
//! # Hash Domain Policy
//!
//! Blob ids are content-only (`BLAKE3(bytes)`): identical bytes are the same
//! blob, and deduplication is expected. Commit ids are domain-separated
//! (`b"commit:"` prefix over a length-framed encoding of payload, parents,
//! author, and date) so a commit can never collide with the blob of its own
//! payload.
//!
//! # Concurrency
//!
//! Every method may suspend. Ref updates are serialized by the backend and
//! honor the caller's compare-and-set expectation; concurrent writers on
//! distinct refs never conflict.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod memory;
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;

/// A 32-byte BLAKE3 object identifier.
///
/// Thin newtype over `[u8; 32]`; the `Display` impl renders lowercase hex
/// for ref payloads, logging, and error messages.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ObjectId(pub [u8; 32]);

impl ObjectId {
    /// View the id as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a 64-character lowercase-hex id.
    ///
    /// # Errors
    /// Returns [`StoreError::MalformedId`] on wrong length or non-hex input.
    pub fn from_hex(s: &str) -> Result<Self, StoreError> {
        let raw = hex::decode(s).map_err(|_| StoreError::MalformedId(s.to_owned()))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| StoreError::MalformedId(s.to_owned()))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Compute the content-only BLAKE3 id of a blob.
pub fn blob_id(bytes: &[u8]) -> ObjectId {
    let hash = blake3::hash(bytes);
    ObjectId(*hash.as_bytes())
}

/// Metadata of a commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit payload (for WarpGraph, a canonical patch envelope).
    pub message: Bytes,
    /// Parent commit ids; empty for the first commit of a chain.
    pub parents: Vec<ObjectId>,
    /// Author string recorded at commit time.
    pub author: String,
    /// Wall-clock commit time, milliseconds since the Unix epoch.
    pub date_epoch_ms: u64,
}

/// One entry returned by [`ObjectStore::list_refs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// Full ref name, e.g. `warp/social/writers/w_…`.
    pub name: String,
    /// Object the ref currently points at.
    pub target: ObjectId,
}

/// Compare-and-set expectation for [`ObjectStore::update_ref`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefCas {
    /// Unconditional update.
    Any,
    /// The ref must not exist yet.
    Absent,
    /// The ref must currently point at exactly this object.
    At(ObjectId),
}

/// Result of a store health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingReport {
    /// Whether the backend answered.
    pub ok: bool,
    /// Observed round-trip latency in milliseconds.
    pub latency_ms: u64,
}

/// Errors surfaced by object-store backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No object with the given id exists.
    #[error("object not found: {0}")]
    MissingObject(ObjectId),
    /// The id refers to an object of the wrong kind (blob where a commit was
    /// expected, or vice versa).
    #[error("object {id} is not a {expected}")]
    WrongKind {
        /// The offending id.
        id: ObjectId,
        /// What the caller asked for (`"commit"` or `"blob"`).
        expected: &'static str,
    },
    /// No ref with the given name exists.
    #[error("ref not found: {0}")]
    MissingRef(String),
    /// A compare-and-set ref update observed a different current value.
    #[error("ref update conflict on {0}")]
    RefConflict(String),
    /// An id string failed to parse.
    #[error("malformed object id: {0}")]
    MalformedId(String),
    /// Backend I/O or protocol failure; retriable at the caller's discretion.
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Content-addressed object store with commits and CAS refs.
///
/// This is the external collaborator boundary: the graph engine is written
/// against this trait and never against a concrete backend. All methods may
/// suspend; implementations must be safe to share across tasks.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an opaque blob; returns its content id. Idempotent.
    async fn write_blob(&self, bytes: Bytes) -> Result<ObjectId, StoreError>;

    /// Fetch a blob by id.
    async fn read_blob(&self, id: ObjectId) -> Result<Bytes, StoreError>;

    /// Create a commit object carrying `message` with the given parents.
    async fn commit(&self, message: Bytes, parents: &[ObjectId]) -> Result<ObjectId, StoreError>;

    /// Fetch a commit's payload.
    async fn show_commit(&self, id: ObjectId) -> Result<Bytes, StoreError>;

    /// Fetch a commit's metadata (payload, parents, author, date).
    async fn commit_info(&self, id: ObjectId) -> Result<CommitInfo, StoreError>;

    /// Point `name` at `target`, honoring the compare-and-set expectation.
    ///
    /// # Errors
    /// [`StoreError::RefConflict`] when the observed current value does not
    /// match `expect`.
    async fn update_ref(
        &self,
        name: &str,
        target: ObjectId,
        expect: RefCas,
    ) -> Result<(), StoreError>;

    /// Read a ref; `None` when it does not exist.
    async fn read_ref(&self, name: &str) -> Result<Option<ObjectId>, StoreError>;

    /// List all refs whose name starts with `prefix`, sorted by name.
    async fn list_refs(&self, prefix: &str) -> Result<Vec<RefEntry>, StoreError>;

    /// Delete a ref. Deleting a missing ref is an error.
    async fn delete_ref(&self, name: &str) -> Result<(), StoreError>;

    /// Count commits reachable from the ref via parent links (inclusive).
    async fn count_reachable(&self, name: &str) -> Result<u64, StoreError>;

    /// Probe backend health and round-trip latency.
    async fn ping(&self) -> Result<PingReport, StoreError>;
}
