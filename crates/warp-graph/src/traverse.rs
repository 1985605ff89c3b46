// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Unweighted traversals over a snapshot.
//!
//! All traversals are deterministic: neighbors expand in sorted order, so
//! two peers holding snapshots with equal state hashes walk identical
//! sequences. BFS/DFS are lazy iterators yielding `(node, depth)`; a fresh
//! iterator restarts the walk from scratch.
//!
//! Traversals follow *alive edges*. An id that only appears as the endpoint
//! of an alive edge is still visited — edge and node aliveness are
//! independent OR-Sets.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::WarpError;
use crate::snapshot::Snapshot;

/// Which way to follow edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow edges from source to target.
    Outgoing,
    /// Follow edges from target back to source.
    Incoming,
}

/// Result of a uniform-cost shortest-path search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
    /// Nodes along the path, endpoints inclusive.
    pub path: Vec<String>,
    /// Number of edges along the path.
    pub length: usize,
}

fn neighbor_ids<'a>(
    snapshot: &'a Snapshot,
    node: &str,
    direction: Direction,
) -> impl Iterator<Item = &'a str> {
    let bucket = match direction {
        Direction::Outgoing => snapshot.out_neighbors(node),
        Direction::Incoming => snapshot.in_neighbors(node),
    };
    bucket.iter().map(|(other, _label)| other.as_str())
}

/// Lazy breadth-first walk.
pub struct Bfs<'a> {
    snapshot: &'a Snapshot,
    direction: Direction,
    queue: VecDeque<(String, usize)>,
    seen: BTreeSet<String>,
}

impl Iterator for Bfs<'_> {
    type Item = (String, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.queue.pop_front()?;
        for neighbor in neighbor_ids(self.snapshot, &node, self.direction) {
            if self.seen.insert(neighbor.to_owned()) {
                self.queue.push_back((neighbor.to_owned(), depth + 1));
            }
        }
        Some((node, depth))
    }
}

/// Lazy depth-first walk.
pub struct Dfs<'a> {
    snapshot: &'a Snapshot,
    direction: Direction,
    stack: Vec<(String, usize)>,
    seen: BTreeSet<String>,
}

impl Iterator for Dfs<'_> {
    type Item = (String, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node, depth) = self.stack.pop()?;
            if !self.seen.insert(node.clone()) {
                continue;
            }
            // Reverse push so the lexicographically smallest neighbor pops
            // first.
            let neighbors: Vec<&str> =
                neighbor_ids(self.snapshot, &node, self.direction).collect();
            for neighbor in neighbors.into_iter().rev() {
                if !self.seen.contains(neighbor) {
                    self.stack.push((neighbor.to_owned(), depth + 1));
                }
            }
            return Some((node, depth));
        }
    }
}

impl Snapshot {
    fn require_start(&self, id: &str) -> Result<(), WarpError> {
        if self.has_node(id) {
            return Ok(());
        }
        Err(WarpError::NotFound(format!("node {id:?}")))
    }

    /// Breadth-first traversal from `start`, yielding `(node, depth)`.
    ///
    /// # Errors
    /// [`WarpError::NotFound`] when `start` is not an alive node.
    pub fn bfs(&self, start: &str, direction: Direction) -> Result<Bfs<'_>, WarpError> {
        self.require_start(start)?;
        let mut seen = BTreeSet::new();
        seen.insert(start.to_owned());
        let mut queue = VecDeque::new();
        queue.push_back((start.to_owned(), 0));
        Ok(Bfs {
            snapshot: self,
            direction,
            queue,
            seen,
        })
    }

    /// Depth-first traversal from `start`, yielding `(node, depth)`.
    ///
    /// # Errors
    /// [`WarpError::NotFound`] when `start` is not an alive node.
    pub fn dfs(&self, start: &str, direction: Direction) -> Result<Dfs<'_>, WarpError> {
        self.require_start(start)?;
        Ok(Dfs {
            snapshot: self,
            direction,
            stack: vec![(start.to_owned(), 0)],
            seen: BTreeSet::new(),
        })
    }

    /// Transitive predecessors of `node` (excluding itself), with depths.
    ///
    /// # Errors
    /// [`WarpError::NotFound`] when `node` is not an alive node.
    pub fn ancestors(&self, node: &str) -> Result<Vec<(String, usize)>, WarpError> {
        Ok(self
            .bfs(node, Direction::Incoming)?
            .filter(|(_, depth)| *depth > 0)
            .collect())
    }

    /// Transitive successors of `node` (excluding itself), with depths.
    ///
    /// # Errors
    /// [`WarpError::NotFound`] when `node` is not an alive node.
    pub fn descendants(&self, node: &str) -> Result<Vec<(String, usize)>, WarpError> {
        Ok(self
            .bfs(node, Direction::Outgoing)?
            .filter(|(_, depth)| *depth > 0)
            .collect())
    }

    /// Kahn's algorithm over the subgraph reachable from `start`.
    ///
    /// Ready nodes are consumed in lexicographic order, so the result is
    /// deterministic among valid topological orders.
    ///
    /// # Errors
    /// [`WarpError::HasCycle`] when any reachable cycle exists;
    /// [`WarpError::NotFound`] when `start` is not an alive node.
    pub fn topological_sort(&self, start: &str) -> Result<Vec<String>, WarpError> {
        let reachable: BTreeSet<String> = self
            .bfs(start, Direction::Outgoing)?
            .map(|(node, _)| node)
            .collect();

        let mut in_degree: BTreeMap<&str, usize> =
            reachable.iter().map(|n| (n.as_str(), 0)).collect();
        for node in &reachable {
            for neighbor in neighbor_ids(self, node, Direction::Outgoing) {
                if let Some(count) = in_degree.get_mut(neighbor) {
                    *count += 1;
                }
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut order = Vec::with_capacity(reachable.len());
        while let Some(node) = ready.iter().next().copied() {
            ready.remove(node);
            order.push(node.to_owned());
            for neighbor in neighbor_ids(self, node, Direction::Outgoing) {
                if let Some(count) = in_degree.get_mut(neighbor) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(neighbor);
                    }
                }
            }
        }
        if order.len() != reachable.len() {
            return Err(WarpError::HasCycle);
        }
        Ok(order)
    }

    /// Uniform-cost (hop count) shortest path.
    ///
    /// # Errors
    /// [`WarpError::NotFound`] when `from` is not an alive node;
    /// [`WarpError::NoPath`] when `to` is unreachable.
    pub fn shortest_path(&self, from: &str, to: &str) -> Result<PathResult, WarpError> {
        self.require_start(from)?;
        if from == to {
            return Ok(PathResult {
                path: vec![from.to_owned()],
                length: 0,
            });
        }
        let mut parent: BTreeMap<String, String> = BTreeMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(from.to_owned());
        let mut seen: BTreeSet<String> = BTreeSet::new();
        seen.insert(from.to_owned());
        while let Some(node) = queue.pop_front() {
            for neighbor in neighbor_ids(self, &node, Direction::Outgoing) {
                if !seen.insert(neighbor.to_owned()) {
                    continue;
                }
                parent.insert(neighbor.to_owned(), node.clone());
                if neighbor == to {
                    let mut path = vec![to.to_owned()];
                    let mut cursor = to;
                    while let Some(prev) = parent.get(cursor) {
                        path.push(prev.clone());
                        cursor = prev;
                    }
                    path.reverse();
                    return Ok(PathResult {
                        length: path.len() - 1,
                        path,
                    });
                }
                queue.push_back(neighbor.to_owned());
            }
        }
        Err(WarpError::NoPath)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::EventId;
    use crate::ident::WriterId;
    use crate::op::EdgeKey;
    use crate::state::GraphState;

    fn ev(lamport: u64, seq: u32) -> EventId {
        EventId::new(lamport, WriterId::parse("w").unwrap(), seq)
    }

    fn diamond() -> Snapshot {
        // a → b → d, a → c → d
        let mut state = GraphState::new();
        let mut seq = 0;
        for id in ["a", "b", "c", "d"] {
            state.record_node_add(id, ev(1, seq));
            seq += 1;
        }
        for (f, t) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")] {
            state.record_edge_add(&EdgeKey::new(f, t, "e"), ev(2, seq));
            seq += 1;
        }
        Snapshot::build(state).unwrap()
    }

    #[test]
    fn bfs_visits_by_depth_in_sorted_order() {
        let snap = diamond();
        let order: Vec<(String, usize)> = snap.bfs("a", Direction::Outgoing).unwrap().collect();
        assert_eq!(
            order,
            vec![
                ("a".to_owned(), 0),
                ("b".to_owned(), 1),
                ("c".to_owned(), 1),
                ("d".to_owned(), 2),
            ]
        );
    }

    #[test]
    fn dfs_goes_deep_first() {
        let snap = diamond();
        let order: Vec<String> = snap
            .dfs("a", Direction::Outgoing)
            .unwrap()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(order, vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn ancestors_and_descendants_respect_orientation() {
        let snap = diamond();
        let ancestors: Vec<String> = snap
            .ancestors("d")
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(ancestors, vec!["b", "c", "a"]);
        let descendants: Vec<String> = snap
            .descendants("a")
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(descendants, vec!["b", "c", "d"]);
    }

    #[test]
    fn topological_sort_orders_the_diamond() {
        let snap = diamond();
        assert_eq!(
            snap.topological_sort("a").unwrap(),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn cycle_is_detected() {
        let mut state = GraphState::new();
        for (i, id) in ["x", "y"].iter().enumerate() {
            state.record_node_add(id, ev(1, i as u32));
        }
        state.record_edge_add(&EdgeKey::new("x", "y", "e"), ev(2, 0));
        state.record_edge_add(&EdgeKey::new("y", "x", "e"), ev(2, 1));
        let snap = Snapshot::build(state).unwrap();
        assert!(matches!(
            snap.topological_sort("x"),
            Err(WarpError::HasCycle)
        ));
    }

    #[test]
    fn shortest_path_finds_two_hops() {
        let snap = diamond();
        let result = snap.shortest_path("a", "d").unwrap();
        assert_eq!(result.length, 2);
        assert_eq!(result.path, vec!["a", "b", "d"]);
    }

    #[test]
    fn shortest_path_to_self_is_trivial() {
        let snap = diamond();
        let result = snap.shortest_path("a", "a").unwrap();
        assert_eq!(result.length, 0);
        assert_eq!(result.path, vec!["a"]);
    }

    #[test]
    fn unreachable_target_is_no_path() {
        let snap = diamond();
        assert!(matches!(
            snap.shortest_path("d", "a"),
            Err(WarpError::NoPath)
        ));
    }

    #[test]
    fn missing_start_is_not_found() {
        let snap = diamond();
        assert!(matches!(
            snap.bfs("zz", Direction::Outgoing),
            Err(WarpError::NotFound(_))
        ));
    }
}
