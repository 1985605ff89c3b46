// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Seek cache: store-backed snapshots for ceiling reads.
//!
//! A ceiling materialize replays every chain from scratch, so repeated
//! time-travel reads of the same `(ceiling, frontier)` pair would be
//! quadratic I/O. The cache keys a serialized state by that pair and keeps
//! it under the graph's `seek-cache/` namespace. Entries are written by a
//! single handle per `(graph, local identity)`, so plain unconditional ref
//! updates suffice.

use blake3::Hasher;
use bytes::Bytes;
use tracing::warn;
use warp_store::{ObjectStore, RefCas};

use crate::checkpoint::Frontier;
use crate::error::WarpError;
use crate::refs::RefLayout;
use crate::serial;
use crate::state::GraphState;

/// Cache key for a `(ceiling, frontier)` pair: 32 hex chars.
pub(crate) fn seek_key(ceiling: u64, frontier: &Frontier) -> String {
    let mut hasher = Hasher::new();
    hasher.update(b"warp/seek/v1");
    hasher.update(&ceiling.to_le_bytes());
    hasher.update(&frontier.digest());
    hex::encode(&hasher.finalize().as_bytes()[..16])
}

/// Look up a cached state. A corrupt entry is treated as a miss.
///
/// # Errors
/// Store failures other than absence.
pub(crate) async fn load(
    store: &dyn ObjectStore,
    layout: &RefLayout,
    key: &str,
) -> Result<Option<GraphState>, WarpError> {
    let name = layout.seek_cache_ref(key);
    let Some(blob_id) = store.read_ref(&name).await? else {
        return Ok(None);
    };
    let bytes = store.read_blob(blob_id).await?;
    match serial::decode_state(&bytes) {
        Ok(state) => Ok(Some(state)),
        Err(err) => {
            warn!(entry = %name, %err, "discarding corrupt seek-cache entry");
            Ok(None)
        }
    }
}

/// Store a state under `key`.
///
/// # Errors
/// Store or encoding failures.
pub(crate) async fn save(
    store: &dyn ObjectStore,
    layout: &RefLayout,
    key: &str,
    state: &GraphState,
) -> Result<(), WarpError> {
    let bytes = serial::encode_state(state)?;
    let blob_id = store.write_blob(Bytes::from(bytes)).await?;
    store
        .update_ref(&layout.seek_cache_ref(key), blob_id, RefCas::Any)
        .await?;
    Ok(())
}
