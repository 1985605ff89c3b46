// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Fluent patch builder.
//!
//! A builder accumulates operations in call order (each gets the next
//! `seq`) and commits them as one atomic patch: `commit()` is the sole
//! suspension point — it assigns the writer's new lamport, canonically
//! encodes the envelope, writes a commit whose parent is the current chain
//! head, and CAS-advances the writer's ref.
//!
//! A ref conflict can only mean the cached head is stale (a single handle
//! never races itself), so `commit()` re-reads the head — refreshing the
//! lamport clock from the patch found there — and retries with exponential
//! backoff, a bounded number of times.
//!
//! Builders are single-use: once `commit()` has run (successfully or not),
//! every further call fails with [`WarpError::PatchFinalized`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::warn;
use warp_store::{ObjectId, ObjectStore, RefCas, StoreError};

use crate::error::WarpError;
use crate::event::next_lamport;
use crate::ident::WriterId;
use crate::op::{EdgeKey, Operation, PropScope, PropValue};
use crate::patch::Patch;

/// Bounded CAS retries before surfacing [`WarpError::Conflict`].
const COMMIT_RETRIES: u32 = 4;
/// Base backoff between retries; doubles each attempt.
const COMMIT_BACKOFF: Duration = Duration::from_millis(10);

/// Writer-local chain cache shared between a handle and its builders.
#[derive(Debug, Default)]
pub(crate) struct ChainState {
    /// Cached chain head; `None` before the first patch.
    pub(crate) head: Option<ObjectId>,
    /// Lamport assigned to this writer's most recent patch.
    pub(crate) lamport: u64,
    /// Greatest lamport observed across materialized patches.
    pub(crate) observed: u64,
}

/// Accumulates one patch and commits it atomically.
pub struct PatchBuilder {
    store: Arc<dyn ObjectStore>,
    ref_name: String,
    writer: WriterId,
    chain: Arc<Mutex<ChainState>>,
    ops: Vec<Operation>,
    finalized: bool,
}

impl PatchBuilder {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        ref_name: String,
        writer: WriterId,
        chain: Arc<Mutex<ChainState>>,
    ) -> Self {
        Self {
            store,
            ref_name,
            writer,
            chain,
            ops: Vec::new(),
            finalized: false,
        }
    }

    fn push(&mut self, op: Operation) -> Result<&mut Self, WarpError> {
        if self.finalized {
            return Err(WarpError::PatchFinalized);
        }
        self.ops.push(op);
        Ok(self)
    }

    /// Queue a node add.
    ///
    /// # Errors
    /// [`WarpError::PatchFinalized`] after `commit()`;
    /// [`WarpError::InvalidArgument`] on an empty id.
    pub fn add_node(&mut self, id: impl Into<String>) -> Result<&mut Self, WarpError> {
        let id = non_empty(id.into(), "node id")?;
        self.push(Operation::NodeAdd { id })
    }

    /// Queue a node remove.
    ///
    /// # Errors
    /// Same as [`add_node`](Self::add_node).
    pub fn remove_node(&mut self, id: impl Into<String>) -> Result<&mut Self, WarpError> {
        let id = non_empty(id.into(), "node id")?;
        self.push(Operation::NodeRemove { id })
    }

    /// Queue an edge add.
    ///
    /// # Errors
    /// [`WarpError::PatchFinalized`] after `commit()`;
    /// [`WarpError::InvalidArgument`] on empty endpoints or label.
    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<&mut Self, WarpError> {
        let key = edge_key(from.into(), to.into(), label.into())?;
        self.push(Operation::EdgeAdd { key })
    }

    /// Queue an edge remove.
    ///
    /// # Errors
    /// Same as [`add_edge`](Self::add_edge).
    pub fn remove_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<&mut Self, WarpError> {
        let key = edge_key(from.into(), to.into(), label.into())?;
        self.push(Operation::EdgeRemove { key })
    }

    /// Queue a node property write.
    ///
    /// # Errors
    /// [`WarpError::PatchFinalized`] after `commit()`;
    /// [`WarpError::InvalidArgument`] on an empty node id or key.
    pub fn set_property(
        &mut self,
        node: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<PropValue>,
    ) -> Result<&mut Self, WarpError> {
        let id = non_empty(node.into(), "node id")?;
        let key = non_empty(key.into(), "property key")?;
        self.push(Operation::PropSet {
            scope: PropScope::Node { id },
            key,
            value: value.into(),
        })
    }

    /// Queue an edge property write.
    ///
    /// # Errors
    /// [`WarpError::PatchFinalized`] after `commit()`;
    /// [`WarpError::InvalidArgument`] on empty edge parts or key.
    pub fn set_edge_property(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<PropValue>,
    ) -> Result<&mut Self, WarpError> {
        let edge = edge_key(from.into(), to.into(), label.into())?;
        let key = non_empty(key.into(), "property key")?;
        self.push(Operation::PropSet {
            scope: PropScope::Edge { key: edge },
            key,
            value: value.into(),
        })
    }

    /// Number of queued operations.
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Commit the accumulated patch as one object and advance the writer ref.
    ///
    /// Returns the new commit's id. Either the commit fully appears with the
    /// ref advanced, or nothing is visible to readers.
    ///
    /// # Errors
    /// [`WarpError::PatchFinalized`] on reuse, [`WarpError::Conflict`] when
    /// CAS keeps failing after bounded retries, plus store failures.
    pub async fn commit(&mut self) -> Result<ObjectId, WarpError> {
        if self.finalized {
            return Err(WarpError::PatchFinalized);
        }
        self.finalized = true;

        let mut chain = self.chain.lock().await;
        let mut backoff = COMMIT_BACKOFF;
        for attempt in 0..=COMMIT_RETRIES {
            let lamport = next_lamport(chain.lamport, chain.observed);
            let patch = Patch {
                writer: self.writer.clone(),
                lamport,
                ops: self.ops.clone(),
            };
            let payload: Bytes = patch.encode()?;

            let parents: Vec<ObjectId> = chain.head.into_iter().collect();
            let commit_id = self.store.commit(payload, &parents).await?;
            let expect = chain.head.map_or(RefCas::Absent, RefCas::At);
            match self.store.update_ref(&self.ref_name, commit_id, expect).await {
                Ok(()) => {
                    chain.head = Some(commit_id);
                    chain.lamport = lamport;
                    return Ok(commit_id);
                }
                Err(StoreError::RefConflict(_)) if attempt < COMMIT_RETRIES => {
                    warn!(
                        ref_name = %self.ref_name,
                        attempt,
                        "stale chain head, re-reading and retrying"
                    );
                    self.refresh_chain(&mut chain).await?;
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(StoreError::RefConflict(name)) => {
                    return Err(WarpError::Conflict(name));
                }
                Err(other) => return Err(other.into()),
            }
        }
        // The loop always returns; reaching here would be a logic error.
        Err(WarpError::Conflict(self.ref_name.clone()))
    }

    /// Re-read the writer ref and refresh the lamport clock from the patch
    /// at the new head.
    async fn refresh_chain(&self, chain: &mut ChainState) -> Result<(), WarpError> {
        let head = self.store.read_ref(&self.ref_name).await?;
        if let Some(head_id) = head {
            let payload = self.store.show_commit(head_id).await?;
            let patch = Patch::decode(&payload).map_err(|cause| WarpError::CorruptPatch {
                commit_id: head_id,
                cause: cause.to_string(),
            })?;
            chain.lamport = chain.lamport.max(patch.lamport);
        }
        chain.head = head;
        Ok(())
    }
}

fn non_empty(s: String, what: &str) -> Result<String, WarpError> {
    if s.is_empty() {
        return Err(WarpError::InvalidArgument(format!("{what} is empty")));
    }
    Ok(s)
}

fn edge_key(from: String, to: String, label: String) -> Result<EdgeKey, WarpError> {
    Ok(EdgeKey {
        from: non_empty(from, "edge source")?,
        to: non_empty(to, "edge target")?,
        label: non_empty(label, "edge label")?,
    })
}
