// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Checkpoints: writer-independent summaries of merged state.
//!
//! Any writer may cut a checkpoint at any cadence; coordination is advisory
//! only. A checkpoint blob carries `{v, f, s, h}`: frontier map, canonical
//! state bytes, and the state hash. Consumers pick the best usable one —
//! usable meaning every frontier head is still an ancestor of (or equal to)
//! the corresponding writer's current head, so the patches since the
//! frontier are exactly the suffix of each chain.

use std::collections::BTreeMap;

use blake3::Hasher;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use warp_canon::Value;
use warp_store::{ObjectId, ObjectStore, RefCas};

use crate::chain;
use crate::error::WarpError;
use crate::ident::WriterId;
use crate::refs::RefLayout;
use crate::serial::{self, StateHash};
use crate::state::GraphState;

/// Wire schema version of checkpoint blobs.
pub const CHECKPOINT_SCHEMA_VERSION: u64 = 1;

/// CAS retries when two publishers race for the same checkpoint index.
const PUBLISH_RETRIES: u32 = 8;

/// Per-writer chain heads observed at a point in time.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Frontier(pub BTreeMap<WriterId, ObjectId>);

impl Frontier {
    /// The empty frontier (no writers observed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Head observed for `writer`, if any.
    pub fn head(&self, writer: &WriterId) -> Option<ObjectId> {
        self.0.get(writer).copied()
    }

    /// Stable digest of the frontier, used for seek-cache keys.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Hasher::new();
        hasher.update(b"warp/frontier/v1");
        for (writer, head) in &self.0 {
            hasher.update(&(writer.as_str().len() as u64).to_le_bytes());
            hasher.update(writer.as_str().as_bytes());
            hasher.update(head.as_bytes());
        }
        *hasher.finalize().as_bytes()
    }
}

/// A loaded, verified checkpoint.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    /// Frontier at which the checkpoint was cut.
    pub frontier: Frontier,
    /// The summarized state.
    pub state: GraphState,
    /// Hash of the canonical state bytes, as stored in the blob.
    pub state_hash: StateHash,
}

/// Encode a checkpoint blob.
///
/// # Errors
/// Propagates canonical-encoding failures.
pub fn encode_checkpoint(state: &GraphState, frontier: &Frontier) -> Result<Bytes, WarpError> {
    let state_bytes = serial::encode_state(state)?;
    let hash = serial::hash_state_bytes(&state_bytes);
    let frontier_entries: Vec<(Value, Value)> = frontier
        .0
        .iter()
        .map(|(writer, head)| {
            (
                Value::Text(writer.as_str().to_owned()),
                Value::Bytes(head.as_bytes().to_vec()),
            )
        })
        .collect();
    let doc = Value::Map(vec![
        (
            Value::Text("v".into()),
            Value::Integer(CHECKPOINT_SCHEMA_VERSION.into()),
        ),
        (Value::Text("f".into()), Value::Map(frontier_entries)),
        (Value::Text("s".into()), Value::Bytes(state_bytes)),
        (Value::Text("h".into()), Value::Bytes(hash.to_vec())),
    ]);
    Ok(Bytes::from(warp_canon::encode(&doc)?))
}

/// Decode and verify a checkpoint blob.
///
/// # Errors
/// [`WarpError::CorruptCheckpoint`] when the blob is malformed or its state
/// hash does not match its state bytes.
pub fn decode_checkpoint(name: &str, bytes: &[u8]) -> Result<Checkpoint, WarpError> {
    let corrupt = |cause: String| WarpError::CorruptCheckpoint {
        name: name.to_owned(),
        cause,
    };
    let doc = warp_canon::decode(bytes).map_err(|e| corrupt(e.to_string()))?;
    let Value::Map(entries) = &doc else {
        return Err(corrupt("not a map".into()));
    };
    let lookup = |key: &str| {
        entries.iter().find_map(|(k, v)| match k {
            Value::Text(t) if t == key => Some(v),
            _ => None,
        })
    };

    match lookup("v") {
        Some(Value::Integer(n)) if i128::from(*n) == i128::from(CHECKPOINT_SCHEMA_VERSION) => {}
        Some(Value::Integer(n)) => {
            return Err(corrupt(format!("unsupported version {}", i128::from(*n))))
        }
        _ => return Err(corrupt("missing version".into())),
    }

    let Some(Value::Map(raw_frontier)) = lookup("f") else {
        return Err(corrupt("missing frontier".into()));
    };
    let mut frontier = Frontier::new();
    for (k, v) in raw_frontier {
        let (Value::Text(writer), Value::Bytes(head)) = (k, v) else {
            return Err(corrupt("malformed frontier entry".into()));
        };
        let writer = WriterId::parse(writer).map_err(|e| corrupt(e.to_string()))?;
        let head: [u8; 32] = head
            .as_slice()
            .try_into()
            .map_err(|_| corrupt("frontier head is not 32 bytes".into()))?;
        frontier.0.insert(writer, ObjectId(head));
    }

    let Some(Value::Bytes(state_bytes)) = lookup("s") else {
        return Err(corrupt("missing state".into()));
    };
    let Some(Value::Bytes(raw_hash)) = lookup("h") else {
        return Err(corrupt("missing hash".into()));
    };
    let stored_hash: StateHash = raw_hash
        .as_slice()
        .try_into()
        .map_err(|_| corrupt("hash is not 32 bytes".into()))?;
    let computed = serial::hash_state_bytes(state_bytes);
    if computed != stored_hash {
        return Err(corrupt("state hash mismatch".into()));
    }
    let state = serial::decode_state(state_bytes).map_err(|e| corrupt(e.to_string()))?;
    Ok(Checkpoint {
        frontier,
        state,
        state_hash: stored_hash,
    })
}

/// Publish a checkpoint under the next free `checkpoints/<n>` ref.
///
/// Returns the allocated index and the blob id. Two publishers racing for
/// the same index are resolved by ref CAS: the loser re-lists and takes the
/// next slot.
///
/// # Errors
/// Store failures, cancellation, or [`WarpError::Conflict`] after the retry
/// budget is exhausted.
pub async fn publish_checkpoint(
    store: &dyn ObjectStore,
    layout: &RefLayout,
    state: &GraphState,
    frontier: &Frontier,
    cancel: &CancellationToken,
) -> Result<(u64, ObjectId), WarpError> {
    let blob = encode_checkpoint(state, frontier)?;
    let blob_id = store.write_blob(blob).await?;

    for _ in 0..PUBLISH_RETRIES {
        if cancel.is_cancelled() {
            return Err(WarpError::Cancelled);
        }
        let existing = store.list_refs(&layout.checkpoints_prefix()).await?;
        let next = existing
            .iter()
            .filter_map(|entry| layout.checkpoint_index(&entry.name))
            .max()
            .map_or(0, |n| n + 1);
        let name = layout.checkpoint_ref(next);
        match store.update_ref(&name, blob_id, RefCas::Absent).await {
            Ok(()) => {
                debug!(checkpoint = %name, blob = %blob_id, "published checkpoint");
                return Ok((next, blob_id));
            }
            Err(warp_store::StoreError::RefConflict(_)) => continue,
            Err(other) => return Err(other.into()),
        }
    }
    Err(WarpError::Conflict(layout.checkpoints_prefix()))
}

/// Find the best usable checkpoint for the observed `heads`.
///
/// A checkpoint is usable iff every frontier head is an ancestor of (or
/// equal to) the current head of that writer; among usable ones the winner
/// covers the greatest total chain length (ties go to the newer index).
/// Corrupt checkpoints are skipped with a warning — readers can always fall
/// back to a full replay.
///
/// # Errors
/// Store failures and cancellation.
pub async fn find_best_checkpoint(
    store: &dyn ObjectStore,
    layout: &RefLayout,
    heads: &BTreeMap<WriterId, ObjectId>,
    cancel: &CancellationToken,
) -> Result<Option<Checkpoint>, WarpError> {
    let refs = store.list_refs(&layout.checkpoints_prefix()).await?;
    let mut best: Option<(u64, u64, Checkpoint)> = None; // (coverage, index, cp)

    for entry in refs {
        if cancel.is_cancelled() {
            return Err(WarpError::Cancelled);
        }
        let Some(index) = layout.checkpoint_index(&entry.name) else {
            continue;
        };
        let bytes = store.read_blob(entry.target).await?;
        let checkpoint = match decode_checkpoint(&entry.name, &bytes) {
            Ok(cp) => cp,
            Err(err) => {
                warn!(checkpoint = %entry.name, %err, "skipping corrupt checkpoint");
                continue;
            }
        };
        match coverage_if_usable(store, &checkpoint, heads, cancel).await? {
            None => continue,
            Some(coverage) => {
                let better = best.as_ref().is_none_or(|(best_cov, best_idx, _)| {
                    (coverage, index) > (*best_cov, *best_idx)
                });
                if better {
                    best = Some((coverage, index, checkpoint));
                }
            }
        }
    }
    Ok(best.map(|(_, _, cp)| cp))
}

/// Total covered chain length if usable, `None` otherwise.
async fn coverage_if_usable(
    store: &dyn ObjectStore,
    checkpoint: &Checkpoint,
    heads: &BTreeMap<WriterId, ObjectId>,
    cancel: &CancellationToken,
) -> Result<Option<u64>, WarpError> {
    let mut coverage = 0u64;
    for (writer, frontier_head) in &checkpoint.frontier.0 {
        // A frontier writer whose ref vanished cannot be verified as a
        // prefix; the checkpoint is unusable.
        let Some(current_head) = heads.get(writer) else {
            return Ok(None);
        };
        if !chain::is_ancestor(store, *frontier_head, *current_head, cancel).await? {
            return Ok(None);
        }
        coverage += chain::length(store, *frontier_head, cancel).await?;
    }
    Ok(Some(coverage))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::EventId;
    use crate::ident::GraphName;
    use crate::op::PropValue;

    fn layout() -> RefLayout {
        RefLayout::new("warp", GraphName::parse("g").unwrap())
    }

    fn writer(s: &str) -> WriterId {
        WriterId::parse(s).unwrap()
    }

    fn sample_state() -> GraphState {
        let mut state = GraphState::new();
        state.record_node_add("n", EventId::new(1, writer("a"), 0));
        state.record_node_prop("n", "k", EventId::new(1, writer("a"), 1), PropValue::Int(1));
        state
    }

    #[test]
    fn checkpoint_blob_round_trips() {
        let state = sample_state();
        let mut frontier = Frontier::new();
        frontier.0.insert(writer("a"), ObjectId([1; 32]));
        let bytes = encode_checkpoint(&state, &frontier).unwrap();
        let back = decode_checkpoint("warp/g/checkpoints/0", &bytes).unwrap();
        assert_eq!(back.frontier, frontier);
        assert_eq!(back.state, state);
        assert_eq!(back.state_hash, serial::state_hash(&state).unwrap());
    }

    #[test]
    fn tampered_blob_is_corrupt() {
        let bytes = encode_checkpoint(&sample_state(), &Frontier::new()).unwrap();
        let mut tampered = bytes.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        assert!(matches!(
            decode_checkpoint("cp", &tampered),
            Err(WarpError::CorruptCheckpoint { .. })
        ));
    }

    #[test]
    fn frontier_digest_tracks_contents() {
        let mut a = Frontier::new();
        a.0.insert(writer("w1"), ObjectId([1; 32]));
        let mut b = a.clone();
        assert_eq!(a.digest(), b.digest());
        b.0.insert(writer("w2"), ObjectId([2; 32]));
        assert_ne!(a.digest(), b.digest());
    }

    #[tokio::test]
    async fn publish_allocates_consecutive_indices() {
        let store = warp_store::MemoryStore::new();
        let layout = layout();
        let cancel = CancellationToken::new();
        let state = sample_state();
        let (first, _) = publish_checkpoint(&store, &layout, &state, &Frontier::new(), &cancel)
            .await
            .unwrap();
        let (second, _) = publish_checkpoint(&store, &layout, &state, &Frontier::new(), &cancel)
            .await
            .unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
    }
}
