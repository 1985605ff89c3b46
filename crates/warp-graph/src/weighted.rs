// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Weighted search: Dijkstra, A*, and bidirectional A*.
//!
//! Weights and heuristics come from async providers because both are often
//! derived from node payloads that live behind the object store. Every
//! search memoizes provider calls for its own duration, so an edge's weight
//! is fetched at most once per search no matter how many relaxations touch
//! it.
//!
//! Weights must be finite and non-negative; a provider returning anything
//! else fails the search with `InvalidWeight`. Heuristic admissibility is
//! the caller's responsibility — an inadmissible heuristic may cost
//! optimality but never termination (every search settles each node at most
//! once).
//!
//! Tie-breaks: lower `g` first, then lexicographic node id. The min-heap's
//! FIFO tie order is not enough for that, so the open set re-sorts
//! equal-priority entries on extraction.

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::WarpError;
use crate::heap::MinHeap;
use crate::snapshot::Snapshot;
use crate::traverse::Direction;

/// Supplies edge weights. Called with the edge's real orientation
/// regardless of search direction.
#[async_trait]
pub trait WeightProvider: Send + Sync {
    /// Weight of the edge `from -> to`. Must be finite and non-negative.
    async fn weight(&self, from: &str, to: &str) -> Result<f64, WarpError>;
}

/// Supplies heuristic estimates of remaining cost from `node` to `goal`.
#[async_trait]
pub trait HeuristicProvider: Send + Sync {
    /// Estimated remaining cost. Admissible heuristics never overestimate.
    async fn estimate(&self, node: &str, goal: &str) -> Result<f64, WarpError>;
}

/// The zero heuristic, which turns A* into Dijkstra.
struct ZeroHeuristic;

#[async_trait]
impl HeuristicProvider for ZeroHeuristic {
    async fn estimate(&self, _node: &str, _goal: &str) -> Result<f64, WarpError> {
        Ok(0.0)
    }
}

/// Result of a weighted search.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPath {
    /// Nodes along the optimal path, endpoints inclusive.
    pub path: Vec<String>,
    /// Sum of edge weights along the path.
    pub total_cost: f64,
    /// Nodes settled before the search terminated.
    pub nodes_explored: usize,
}

/// Per-search weight memo with validation.
struct MemoWeights<'a> {
    provider: &'a dyn WeightProvider,
    cache: FxHashMap<(String, String), f64>,
}

impl<'a> MemoWeights<'a> {
    fn new(provider: &'a dyn WeightProvider) -> Self {
        Self {
            provider,
            cache: FxHashMap::default(),
        }
    }

    async fn get(&mut self, from: &str, to: &str) -> Result<f64, WarpError> {
        if let Some(w) = self.cache.get(&(from.to_owned(), to.to_owned())) {
            return Ok(*w);
        }
        let w = self.provider.weight(from, to).await?;
        if !w.is_finite() || w < 0.0 {
            return Err(WarpError::InvalidWeight {
                from: from.to_owned(),
                to: to.to_owned(),
                weight: w,
            });
        }
        self.cache.insert((from.to_owned(), to.to_owned()), w);
        Ok(w)
    }
}

/// Per-search heuristic memo.
struct MemoHeuristic<'a> {
    provider: &'a dyn HeuristicProvider,
    goal: String,
    cache: FxHashMap<String, f64>,
}

impl<'a> MemoHeuristic<'a> {
    fn new(provider: &'a dyn HeuristicProvider, goal: &str) -> Self {
        Self {
            provider,
            goal: goal.to_owned(),
            cache: FxHashMap::default(),
        }
    }

    async fn get(&mut self, node: &str) -> Result<f64, WarpError> {
        if let Some(h) = self.cache.get(node) {
            return Ok(*h);
        }
        let h = self.provider.estimate(node, &self.goal).await?;
        self.cache.insert(node.to_owned(), h);
        Ok(h)
    }
}

#[derive(Debug, Clone)]
struct OpenEntry {
    node: String,
    g: f64,
}

/// Open set enforcing the full tie-break: priority, then `g`, then node id.
///
/// The heap alone breaks priority ties FIFO; on extraction this wrapper
/// drains the whole equal-priority batch, picks the `(g, node)` minimum,
/// and re-inserts the rest (their priority is unchanged, so re-insertion is
/// order-preserving).
struct OpenSet {
    heap: MinHeap<OpenEntry>,
}

impl OpenSet {
    fn new() -> Self {
        Self {
            heap: MinHeap::new(),
        }
    }

    fn push(&mut self, node: String, g: f64, priority: f64) {
        self.heap.insert(OpenEntry { node, g }, priority);
    }

    fn min_priority(&self) -> Option<f64> {
        self.heap.peek_priority()
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn pop(&mut self) -> Option<(OpenEntry, f64)> {
        let (first, priority) = self.heap.extract_min()?;
        let mut batch = vec![first];
        while self
            .heap
            .peek_priority()
            .is_some_and(|p| p.total_cmp(&priority).is_eq())
        {
            if let Some((entry, _)) = self.heap.extract_min() {
                batch.push(entry);
            }
        }
        batch.sort_by(|a, b| a.g.total_cmp(&b.g).then_with(|| a.node.cmp(&b.node)));
        let mut rest = batch.into_iter();
        let winner = rest.next()?;
        for entry in rest {
            self.heap.insert(entry, priority);
        }
        Some((winner, priority))
    }
}

struct SearchSide {
    open: OpenSet,
    best_g: FxHashMap<String, f64>,
    parent: FxHashMap<String, String>,
    settled: FxHashSet<String>,
}

impl SearchSide {
    fn new(start: &str) -> Self {
        let mut side = Self {
            open: OpenSet::new(),
            best_g: FxHashMap::default(),
            parent: FxHashMap::default(),
            settled: FxHashSet::default(),
        };
        side.best_g.insert(start.to_owned(), 0.0);
        side.open.push(start.to_owned(), 0.0, 0.0);
        side
    }

    fn g(&self, node: &str) -> Option<f64> {
        self.best_g.get(node).copied()
    }

    fn path_to(&self, node: &str) -> Vec<String> {
        let mut path = vec![node.to_owned()];
        let mut cursor = node;
        while let Some(prev) = self.parent.get(cursor) {
            path.push(prev.clone());
            cursor = prev;
        }
        path.reverse();
        path
    }
}

fn directed_neighbors(snapshot: &Snapshot, node: &str, direction: Direction) -> Vec<String> {
    let bucket = match direction {
        Direction::Outgoing => snapshot.out_neighbors(node),
        Direction::Incoming => snapshot.in_neighbors(node),
    };
    let mut ids: Vec<String> = bucket.iter().map(|(other, _label)| other.clone()).collect();
    // Parallel edges with distinct labels reach the same neighbor; relaxing
    // it once is enough because the weight provider sees only endpoints.
    ids.dedup();
    ids
}

/// Weight-provider arguments for stepping from `node` to `neighbor`: always
/// the edge's real orientation.
fn edge_endpoints<'n>(node: &'n str, neighbor: &'n str, direction: Direction) -> (&'n str, &'n str) {
    match direction {
        Direction::Outgoing => (node, neighbor),
        Direction::Incoming => (neighbor, node),
    }
}

impl Snapshot {
    /// Dijkstra over the snapshot with an async weight provider.
    ///
    /// # Errors
    /// [`WarpError::NotFound`] for a missing start,
    /// [`WarpError::InvalidWeight`] from the provider,
    /// [`WarpError::NoPath`] when `to` is unreachable.
    pub async fn weighted_shortest_path(
        &self,
        from: &str,
        to: &str,
        weights: &dyn WeightProvider,
        direction: Direction,
    ) -> Result<WeightedPath, WarpError> {
        self.astar_core(from, to, weights, &ZeroHeuristic, direction)
            .await
    }

    /// A* with async weight and heuristic providers, over outgoing edges.
    ///
    /// # Errors
    /// Same as [`weighted_shortest_path`](Self::weighted_shortest_path).
    pub async fn a_star_search(
        &self,
        from: &str,
        to: &str,
        weights: &dyn WeightProvider,
        heuristic: &dyn HeuristicProvider,
    ) -> Result<WeightedPath, WarpError> {
        self.astar_core(from, to, weights, heuristic, Direction::Outgoing)
            .await
    }

    async fn astar_core(
        &self,
        from: &str,
        to: &str,
        weights: &dyn WeightProvider,
        heuristic: &dyn HeuristicProvider,
        direction: Direction,
    ) -> Result<WeightedPath, WarpError> {
        if !self.has_node(from) {
            return Err(WarpError::NotFound(format!("node {from:?}")));
        }
        let mut memo = MemoWeights::new(weights);
        let mut estimate = MemoHeuristic::new(heuristic, to);
        let mut side = SearchSide::new(from);
        let mut explored = 0usize;

        while let Some((entry, _)) = side.open.pop() {
            if !side.settled.insert(entry.node.clone()) {
                continue;
            }
            explored += 1;
            if entry.node == to {
                return Ok(WeightedPath {
                    path: side.path_to(&entry.node),
                    total_cost: entry.g,
                    nodes_explored: explored,
                });
            }
            for neighbor in directed_neighbors(self, &entry.node, direction) {
                if side.settled.contains(&neighbor) {
                    continue;
                }
                let (wf, wt) = edge_endpoints(&entry.node, &neighbor, direction);
                let weight = memo.get(wf, wt).await?;
                let candidate = entry.g + weight;
                let improves = side.g(&neighbor).is_none_or(|g| candidate < g);
                if improves {
                    side.best_g.insert(neighbor.clone(), candidate);
                    side.parent.insert(neighbor.clone(), entry.node.clone());
                    let h = estimate.get(&neighbor).await?;
                    side.open.push(neighbor, candidate, candidate + h);
                }
            }
        }
        Err(WarpError::NoPath)
    }

    /// Bidirectional A*: simultaneous forward and backward frontiers.
    ///
    /// Terminates once the best meeting cost is at or below the minimum
    /// priority of either open set.
    ///
    /// # Errors
    /// Same as [`weighted_shortest_path`](Self::weighted_shortest_path).
    pub async fn bidirectional_a_star(
        &self,
        from: &str,
        to: &str,
        weights: &dyn WeightProvider,
        forward_heuristic: &dyn HeuristicProvider,
        backward_heuristic: &dyn HeuristicProvider,
    ) -> Result<WeightedPath, WarpError> {
        if !self.has_node(from) {
            return Err(WarpError::NotFound(format!("node {from:?}")));
        }
        let mut memo = MemoWeights::new(weights);
        let mut forward_h = MemoHeuristic::new(forward_heuristic, to);
        let mut backward_h = MemoHeuristic::new(backward_heuristic, from);
        let mut forward = SearchSide::new(from);
        let mut backward = SearchSide::new(to);
        let mut explored = 0usize;
        let mut best_meet: Option<(String, f64)> = None;

        while !forward.open.is_empty() || !backward.open.is_empty() {
            let top_f = forward.open.min_priority().unwrap_or(f64::INFINITY);
            let top_b = backward.open.min_priority().unwrap_or(f64::INFINITY);
            if let Some((_, mu)) = &best_meet {
                if *mu <= top_f.min(top_b) {
                    break;
                }
            }

            let goes_forward =
                (top_f <= top_b && !forward.open.is_empty()) || backward.open.is_empty();
            let (side, other) = if goes_forward {
                (&mut forward, &backward)
            } else {
                (&mut backward, &forward)
            };

            let Some((entry, _)) = side.open.pop() else {
                continue;
            };
            if !side.settled.insert(entry.node.clone()) {
                continue;
            }
            explored += 1;
            if let Some(other_g) = other.g(&entry.node) {
                let total = entry.g + other_g;
                let better = best_meet.as_ref().is_none_or(|(_, mu)| total < *mu);
                if better {
                    best_meet = Some((entry.node.clone(), total));
                }
            }

            let direction = if goes_forward {
                Direction::Outgoing
            } else {
                Direction::Incoming
            };
            for neighbor in directed_neighbors(self, &entry.node, direction) {
                if side.settled.contains(&neighbor) {
                    continue;
                }
                let (wf, wt) = edge_endpoints(&entry.node, &neighbor, direction);
                let weight = memo.get(wf, wt).await?;
                let candidate = entry.g + weight;
                let improves = side.g(&neighbor).is_none_or(|g| candidate < g);
                if improves {
                    side.best_g.insert(neighbor.clone(), candidate);
                    side.parent.insert(neighbor.clone(), entry.node.clone());
                    let h = if goes_forward {
                        forward_h.get(&neighbor).await?
                    } else {
                        backward_h.get(&neighbor).await?
                    };
                    side.open.push(neighbor.clone(), candidate, candidate + h);
                    // A relaxed node reached from the other side is a
                    // candidate meeting point too.
                    if let Some(other_g) = other.g(&neighbor) {
                        let total = candidate + other_g;
                        let better = best_meet.as_ref().is_none_or(|(_, mu)| total < *mu);
                        if better {
                            best_meet = Some((neighbor.clone(), total));
                        }
                    }
                }
            }
        }

        let Some((meet, total_cost)) = best_meet else {
            return Err(WarpError::NoPath);
        };
        let mut path = forward.path_to(&meet);
        let mut tail = backward.path_to(&meet);
        tail.reverse();
        path.extend(tail.into_iter().skip(1));
        Ok(WeightedPath {
            path,
            total_cost,
            nodes_explored: explored,
        })
    }
}
