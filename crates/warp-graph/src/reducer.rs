// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! The reducer: a deterministic CRDT fold over an unordered patch set.
//!
//! `reduce` sorts patches into event-id order, derives per-op event ids,
//! and folds them into a state. The result depends only on the *set* of
//! patches — never their arrival order — which is the suite's primary
//! property-based invariant. The fold is pure CPU and never suspends.
//!
//! Applying the same patch twice is harmless: OR-Set maxima and
//! strictly-greater LWW comparisons are idempotent, so callers do not need
//! to deduplicate chains.

use crate::event::EventId;
use crate::op::{Operation, PropScope};
use crate::patch::Patch;
use crate::state::GraphState;

/// Fold `patches` onto `base` (or the empty state).
///
/// Patches from one writer always carry strictly monotone lamports by
/// construction, so sorting by `(lamport, writer)` preserves each writer's
/// chain order while interleaving writers deterministically.
///
/// The incremental path — `base` from a checkpoint plus only the patches
/// newer than its frontier — produces the same state as a full fold, as
/// long as every base event precedes every new one in event order.
pub fn reduce(mut patches: Vec<Patch>, base: Option<GraphState>) -> GraphState {
    patches.sort_by(|a, b| {
        a.lamport
            .cmp(&b.lamport)
            .then_with(|| a.writer.cmp(&b.writer))
    });

    let mut state = base.unwrap_or_default();
    for patch in patches {
        for (index, op) in patch.ops.iter().enumerate() {
            let event = EventId::new(patch.lamport, patch.writer.clone(), index as u32);
            apply(&mut state, event, op);
        }
    }
    state
}

fn apply(state: &mut GraphState, event: EventId, op: &Operation) {
    match op {
        Operation::NodeAdd { id } => state.record_node_add(id, event),
        Operation::NodeRemove { id } => state.record_node_remove(id, event),
        Operation::EdgeAdd { key } => state.record_edge_add(key, event),
        Operation::EdgeRemove { key } => state.record_edge_remove(key, event),
        Operation::PropSet { scope, key, value } => match scope {
            PropScope::Node { id } => state.record_node_prop(id, key, event, value.clone()),
            PropScope::Edge { key: edge } => {
                state.record_edge_prop(edge, key, event, value.clone());
            }
        },
    }
}
