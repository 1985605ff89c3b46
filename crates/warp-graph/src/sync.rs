// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Multi-writer synchronization: the materialization pipeline.
//!
//! One materialize pass:
//!
//! 1. list writer refs and decode writer ids from the ref names;
//! 2. snapshot each writer's current chain head;
//! 3. pick the best usable checkpoint (or start from the empty state);
//! 4. walk each chain from its head back to the checkpoint frontier,
//!    concurrently across writers;
//! 5. decode the collected patch payloads (a decode failure is fatal and
//!    names the offending commit);
//! 6. fold the patches onto the checkpoint state.
//!
//! Ref reads are snapshot-per-materialize: a writer advancing its head
//! mid-pass is simply included up to the head observed in step 2. New
//! writers may appear at any time; their whole chain is walked.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use warp_store::{ObjectId, ObjectStore};

use crate::chain;
use crate::checkpoint::{find_best_checkpoint, Frontier};
use crate::error::WarpError;
use crate::ident::WriterId;
use crate::patch::Patch;
use crate::reducer::reduce;
use crate::refs::RefLayout;
use crate::state::GraphState;

/// Result of one materialize pass.
#[derive(Clone, Debug)]
pub struct SyncOutcome {
    /// The merged state.
    pub state: GraphState,
    /// Chain heads observed at the start of the pass.
    pub frontier: Frontier,
    /// Patches folded on top of the base state.
    pub patches_applied: usize,
    /// Whether a checkpoint supplied the base state.
    pub from_checkpoint: bool,
}

/// Discover writers and snapshot their current chain heads.
///
/// Refs under the writers namespace whose suffix does not parse as a writer
/// id are skipped (with a warning) rather than failing discovery.
///
/// # Errors
/// Store failures.
pub(crate) async fn collect_writer_heads(
    store: &dyn ObjectStore,
    layout: &RefLayout,
) -> Result<BTreeMap<WriterId, ObjectId>, WarpError> {
    let refs = store.list_refs(&layout.writers_prefix()).await?;
    let mut heads = BTreeMap::new();
    for entry in refs {
        match layout.writer_from_ref(&entry.name) {
            Some(writer) => {
                heads.insert(writer, entry.target);
            }
            None => {
                tracing::warn!(name = %entry.name, "skipping undecodable writer ref");
            }
        }
    }
    Ok(heads)
}

/// Full materialize: checkpoint base plus the patches since its frontier.
///
/// # Errors
/// Store failures, [`WarpError::CorruptPatch`], and cancellation.
pub(crate) async fn materialize(
    store: &dyn ObjectStore,
    layout: &RefLayout,
    cancel: &CancellationToken,
) -> Result<SyncOutcome, WarpError> {
    let heads = collect_writer_heads(store, layout).await?;
    if cancel.is_cancelled() {
        return Err(WarpError::Cancelled);
    }

    let checkpoint = find_best_checkpoint(store, layout, &heads, cancel).await?;
    let (base, stops, mut from_checkpoint) = match checkpoint {
        Some(cp) => (cp.state, cp.frontier, true),
        None => (GraphState::new(), Frontier::new(), false),
    };

    let mut patches = collect_patches(store, &heads, &stops, None, cancel).await?;
    // Incremental folding is only sound when every new event outranks every
    // event already summarized in the base. A laggard writer that never
    // materialized can emit events below the checkpoint's horizon; folding
    // those onto the summary would skip generation bookkeeping the full
    // replay performs. Detect that and replay from scratch instead.
    let laggard = from_checkpoint && {
        let horizon = base.max_event().cloned();
        horizon.is_some_and(|h| {
            patches
                .iter()
                .any(|p| crate::event::EventId::new(p.lamport, p.writer.clone(), 0) <= h)
        })
    };
    let (base, patches) = if laggard {
        tracing::warn!(
            graph = %layout.graph(),
            "patch below checkpoint horizon; falling back to full replay"
        );
        from_checkpoint = false;
        patches = collect_patches(store, &heads, &Frontier::new(), None, cancel).await?;
        (GraphState::new(), patches)
    } else {
        (base, patches)
    };

    let patches_applied = patches.len();
    debug!(
        graph = %layout.graph(),
        writers = heads.len(),
        patches = patches_applied,
        from_checkpoint,
        "materializing"
    );

    let state = reduce(patches, Some(base));
    Ok(SyncOutcome {
        state,
        frontier: Frontier(heads),
        patches_applied,
        from_checkpoint,
    })
}

/// Ceiling materialize: full replay of every chain, keeping only patches
/// with `lamport <= ceiling`. Checkpoints are not consulted — they may
/// already contain events above the ceiling. `heads` is the ref snapshot
/// the caller already took (it also keys the seek cache).
///
/// # Errors
/// Store failures, [`WarpError::CorruptPatch`], and cancellation.
pub(crate) async fn materialize_at(
    store: &dyn ObjectStore,
    layout: &RefLayout,
    heads: BTreeMap<WriterId, ObjectId>,
    ceiling: u64,
    cancel: &CancellationToken,
) -> Result<SyncOutcome, WarpError> {
    let patches = collect_patches(store, &heads, &Frontier::new(), Some(ceiling), cancel).await?;
    let patches_applied = patches.len();
    debug!(
        graph = %layout.graph(),
        writers = heads.len(),
        patches = patches_applied,
        ceiling,
        "materializing at ceiling"
    );
    let state = reduce(patches, None);
    Ok(SyncOutcome {
        state,
        frontier: Frontier(heads),
        patches_applied,
        from_checkpoint: false,
    })
}

/// Walk every writer's chain concurrently and decode the collected patches.
async fn collect_patches(
    store: &dyn ObjectStore,
    heads: &BTreeMap<WriterId, ObjectId>,
    stops: &Frontier,
    ceiling: Option<u64>,
    cancel: &CancellationToken,
) -> Result<Vec<Patch>, WarpError> {
    let walks = heads.iter().map(|(writer, head)| async move {
        let stop = stops.head(writer);
        let Some(commits) = chain::segment(store, *head, stop, cancel).await? else {
            // The checkpoint was validated as usable against these heads.
            return Err(WarpError::Internal(format!(
                "frontier head for {writer} is not an ancestor of its chain"
            )));
        };
        let mut patches = Vec::with_capacity(commits.len());
        for commit_id in commits {
            if cancel.is_cancelled() {
                return Err(WarpError::Cancelled);
            }
            let payload = store.show_commit(commit_id).await?;
            let patch = Patch::decode(&payload).map_err(|cause| WarpError::CorruptPatch {
                commit_id,
                cause: cause.to_string(),
            })?;
            if ceiling.is_none_or(|c| patch.lamport <= c) {
                patches.push(patch);
            }
        }
        Ok(patches)
    });
    let collected = try_join_all(walks).await?;
    Ok(collected.into_iter().flatten().collect())
}
