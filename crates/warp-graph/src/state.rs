// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Materialized graph state: OR-Sets for nodes and edges, LWW property maps.
//!
//! Storage is `BTreeMap` throughout — iteration order feeds the canonical
//! serializer and the state hash, so it must be deterministic.
//!
//! # Aliveness
//!
//! Each element keeps only the *maximum* add event and the *maximum*
//! tombstone event; an element is alive iff its max add exceeds its max
//! tombstone in event-id order. Maxima are sufficient because the fold
//! applies operations in total event order.
//!
//! # Generations and clean-slate
//!
//! An element's generation counts its alive→dead→alive transitions. When a
//! re-add flips an element back to alive, the generation bumps and every
//! property recorded for it is purged: the new life starts with a clean
//! slate. Because purging is eager, every surviving property entry belongs
//! to the current generation, so entries store only `(event, value)`.

use std::collections::BTreeMap;

use crate::event::EventId;
use crate::op::{EdgeKey, PropValue};

/// OR-Set bookkeeping for one node or edge.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ElementState {
    /// Greatest add event observed, if any.
    pub max_add: Option<EventId>,
    /// Greatest tombstone event observed, if any.
    pub max_tomb: Option<EventId>,
    /// Count of alive→dead→alive transitions.
    pub generation: u64,
}

impl ElementState {
    /// Alive iff some add event exceeds every tombstone.
    pub fn alive(&self) -> bool {
        match (&self.max_add, &self.max_tomb) {
            (Some(add), Some(tomb)) => add > tomb,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// One LWW property entry. Purging on generation bump keeps the map free of
/// stale-generation entries, so the event id alone decides overwrites.
#[derive(Clone, PartialEq, Debug)]
pub struct PropEntry {
    /// Event that wrote the value.
    pub event: EventId,
    /// The value itself.
    pub value: PropValue,
}

/// Deterministic materialized state of one graph.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct GraphState {
    pub(crate) nodes: BTreeMap<String, ElementState>,
    pub(crate) edges: BTreeMap<EdgeKey, ElementState>,
    pub(crate) node_props: BTreeMap<(String, String), PropEntry>,
    pub(crate) edge_props: BTreeMap<(EdgeKey, String), PropEntry>,
}

impl GraphState {
    /// The empty state.
    pub fn new() -> Self {
        Self::default()
    }

    // ── reducer-side mutators ────────────────────────────────────────────

    pub(crate) fn record_node_add(&mut self, id: &str, event: EventId) {
        let element = self.nodes.entry(id.to_owned()).or_default();
        let was_alive = element.alive();
        let had_add = element.max_add.is_some();
        if element.max_add.as_ref() < Some(&event) {
            element.max_add = Some(event);
        }
        if !was_alive && element.alive() && had_add {
            element.generation += 1;
            purge_range(&mut self.node_props, |k| k.0 == id, id.to_owned());
        }
    }

    pub(crate) fn record_node_remove(&mut self, id: &str, event: EventId) {
        let element = self.nodes.entry(id.to_owned()).or_default();
        if element.max_tomb.as_ref() < Some(&event) {
            element.max_tomb = Some(event);
        }
    }

    pub(crate) fn record_edge_add(&mut self, key: &EdgeKey, event: EventId) {
        let element = self.edges.entry(key.clone()).or_default();
        let was_alive = element.alive();
        let had_add = element.max_add.is_some();
        if element.max_add.as_ref() < Some(&event) {
            element.max_add = Some(event);
        }
        if !was_alive && element.alive() && had_add {
            element.generation += 1;
            purge_range(&mut self.edge_props, |k| &k.0 == key, key.clone());
        }
    }

    pub(crate) fn record_edge_remove(&mut self, key: &EdgeKey, event: EventId) {
        let element = self.edges.entry(key.clone()).or_default();
        if element.max_tomb.as_ref() < Some(&event) {
            element.max_tomb = Some(event);
        }
    }

    pub(crate) fn record_node_prop(
        &mut self,
        id: &str,
        key: &str,
        event: EventId,
        value: PropValue,
    ) {
        let slot = (id.to_owned(), key.to_owned());
        lww_write(&mut self.node_props, slot, event, value);
    }

    pub(crate) fn record_edge_prop(
        &mut self,
        edge: &EdgeKey,
        key: &str,
        event: EventId,
        value: PropValue,
    ) {
        let slot = (edge.clone(), key.to_owned());
        lww_write(&mut self.edge_props, slot, event, value);
    }

    // ── read side ────────────────────────────────────────────────────────

    /// Whether the node is currently alive.
    pub fn node_alive(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(ElementState::alive)
    }

    /// Whether the edge is currently alive.
    pub fn edge_alive(&self, key: &EdgeKey) -> bool {
        self.edges.get(key).is_some_and(ElementState::alive)
    }

    /// Alive node ids in sorted order.
    pub fn alive_nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|(_, el)| el.alive())
            .map(|(id, _)| id.as_str())
    }

    /// Alive edge keys in sorted order.
    pub fn alive_edges(&self) -> impl Iterator<Item = &EdgeKey> {
        self.edges
            .iter()
            .filter(|(_, el)| el.alive())
            .map(|(key, _)| key)
    }

    /// Visible properties of a node; empty if the node is not alive.
    pub fn node_props(&self, id: &str) -> BTreeMap<&str, &PropValue> {
        if !self.node_alive(id) {
            return BTreeMap::new();
        }
        self.node_props
            .range((id.to_owned(), String::new())..)
            .take_while(|((owner, _), _)| owner == id)
            .map(|((_, key), entry)| (key.as_str(), &entry.value))
            .collect()
    }

    /// One visible node property.
    pub fn node_prop(&self, id: &str, key: &str) -> Option<&PropValue> {
        if !self.node_alive(id) {
            return None;
        }
        self.node_props
            .get(&(id.to_owned(), key.to_owned()))
            .map(|entry| &entry.value)
    }

    /// Visible properties of an edge; empty if the edge is not alive.
    pub fn edge_props(&self, key: &EdgeKey) -> BTreeMap<&str, &PropValue> {
        if !self.edge_alive(key) {
            return BTreeMap::new();
        }
        self.edge_props
            .range((key.clone(), String::new())..)
            .take_while(|((owner, _), _)| owner == key)
            .map(|((_, prop), entry)| (prop.as_str(), &entry.value))
            .collect()
    }

    /// Number of alive nodes.
    pub fn alive_node_count(&self) -> usize {
        self.alive_nodes().count()
    }

    /// Number of alive edges.
    pub fn alive_edge_count(&self) -> usize {
        self.alive_edges().count()
    }

    /// Greatest event id across everything recorded in this state.
    ///
    /// Incremental folding is sound only for patches whose events all
    /// exceed this horizon.
    pub fn max_event(&self) -> Option<&EventId> {
        fn element_max(el: &ElementState) -> Option<&EventId> {
            match (&el.max_add, &el.max_tomb) {
                (Some(a), Some(t)) => Some(a.max(t)),
                (Some(a), None) => Some(a),
                (None, Some(t)) => Some(t),
                (None, None) => None,
            }
        }
        let nodes = self.nodes.values().filter_map(element_max);
        let edges = self.edges.values().filter_map(element_max);
        let node_props = self.node_props.values().map(|p| &p.event);
        let edge_props = self.edge_props.values().map(|p| &p.event);
        nodes.chain(edges).chain(node_props).chain(edge_props).max()
    }

    /// Greatest lamport value across every recorded event.
    ///
    /// This is the "max observed lamport" a writer folds into its own clock
    /// before committing.
    pub fn max_lamport(&self) -> u64 {
        let element_max = |el: &ElementState| {
            el.max_add
                .as_ref()
                .map_or(0, |e| e.lamport)
                .max(el.max_tomb.as_ref().map_or(0, |e| e.lamport))
        };
        let nodes = self.nodes.values().map(element_max);
        let edges = self.edges.values().map(element_max);
        let node_props = self.node_props.values().map(|p| p.event.lamport);
        let edge_props = self.edge_props.values().map(|p| p.event.lamport);
        nodes
            .chain(edges)
            .chain(node_props)
            .chain(edge_props)
            .max()
            .unwrap_or(0)
    }
}

/// Remove every property entry owned by one element.
///
/// `start` must be the smallest possible key for that owner so the range
/// scan begins exactly at its first entry.
fn purge_range<O: Ord + Clone, F: Fn(&(O, String)) -> bool>(
    map: &mut BTreeMap<(O, String), PropEntry>,
    owned: F,
    start: O,
) {
    let stale: Vec<(O, String)> = map
        .range((start, String::new())..)
        .take_while(|(k, _)| owned(k))
        .map(|(k, _)| k.clone())
        .collect();
    for key in stale {
        map.remove(&key);
    }
}

fn lww_write<K: Ord>(
    map: &mut BTreeMap<K, PropEntry>,
    slot: K,
    event: EventId,
    value: PropValue,
) {
    match map.get_mut(&slot) {
        Some(existing) if existing.event >= event => {}
        Some(existing) => {
            *existing = PropEntry { event, value };
        }
        None => {
            map.insert(slot, PropEntry { event, value });
        }
    }
}
