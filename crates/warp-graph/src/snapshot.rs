// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Immutable read view over a materialized state.
//!
//! A snapshot wraps a [`GraphState`] with precomputed adjacency (outbound
//! and inbound, both sorted) and the state hash. Queries and traversals
//! read snapshots; they never touch the store. Snapshots are cheap to share
//! behind an `Arc` and safe to read from any task.

use std::collections::BTreeMap;

use crate::error::WarpError;
use crate::op::{EdgeKey, PropValue};
use crate::serial::{self, StateHash};
use crate::state::GraphState;

/// Immutable deterministic view of one materialized state.
#[derive(Clone, Debug)]
pub struct Snapshot {
    state: GraphState,
    out: BTreeMap<String, Vec<(String, String)>>,
    inbound: BTreeMap<String, Vec<(String, String)>>,
    hash: StateHash,
}

impl Snapshot {
    /// Build a snapshot (adjacency + hash) from a state.
    ///
    /// # Errors
    /// Propagates canonical-encoding failures from hashing.
    pub fn build(state: GraphState) -> Result<Self, WarpError> {
        let hash = serial::state_hash(&state)?;
        let mut out: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        let mut inbound: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        for key in state.alive_edges() {
            out.entry(key.from.clone())
                .or_default()
                .push((key.to.clone(), key.label.clone()));
            inbound
                .entry(key.to.clone())
                .or_default()
                .push((key.from.clone(), key.label.clone()));
        }
        // BTreeMap iteration is already sorted by edge key, which sorts each
        // outbound bucket by (to, label); inbound buckets need an explicit
        // sort because they arrive in (from, to, label) order.
        for bucket in inbound.values_mut() {
            bucket.sort();
        }
        Ok(Self {
            state,
            out,
            inbound,
            hash,
        })
    }

    /// The underlying state.
    pub fn state(&self) -> &GraphState {
        &self.state
    }

    /// BLAKE3 hash of the canonical state bytes.
    pub fn state_hash(&self) -> StateHash {
        self.hash
    }

    /// Lowercase-hex rendering of the state hash.
    pub fn state_hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Alive node ids, sorted.
    pub fn nodes(&self) -> Vec<String> {
        self.state.alive_nodes().map(str::to_owned).collect()
    }

    /// Alive edges, sorted by `(from, to, label)`.
    pub fn edges(&self) -> Vec<EdgeKey> {
        self.state.alive_edges().cloned().collect()
    }

    /// Whether the node is alive.
    pub fn has_node(&self, id: &str) -> bool {
        self.state.node_alive(id)
    }

    /// Whether the edge is alive.
    pub fn has_edge(&self, from: &str, to: &str, label: &str) -> bool {
        self.state
            .edge_alive(&EdgeKey::new(from, to, label))
    }

    /// Visible properties of a node (empty when not alive).
    pub fn node_props(&self, id: &str) -> BTreeMap<String, PropValue> {
        self.state
            .node_props(id)
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.clone()))
            .collect()
    }

    /// Visible properties of an edge (empty when not alive).
    pub fn edge_props(&self, from: &str, to: &str, label: &str) -> BTreeMap<String, PropValue> {
        self.state
            .edge_props(&EdgeKey::new(from, to, label))
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.clone()))
            .collect()
    }

    /// Outbound `(to, label)` pairs of `node`, sorted.
    pub(crate) fn out_neighbors(&self, node: &str) -> &[(String, String)] {
        self.out.get(node).map_or(&[], Vec::as_slice)
    }

    /// Inbound `(from, label)` pairs of `node`, sorted.
    pub(crate) fn in_neighbors(&self, node: &str) -> &[(String, String)] {
        self.inbound.get(node).map_or(&[], Vec::as_slice)
    }
}
