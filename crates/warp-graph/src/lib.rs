// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! warp-graph: a multi-writer, content-addressed CRDT property graph.
//!
//! Writers append patches — atomic, canonically encoded batches of graph
//! operations — into per-writer ref chains inside a content-addressed
//! object store. Readers materialize a deterministic merged state by
//! folding every writer's patches under OR-Set + LWW semantics with causal
//! tie-breaking, then serve queries and traversals from the resulting
//! snapshot.
//!
//! # Determinism contract
//!
//! Two peers observing the same set of patches — in any order — produce
//! byte-identical canonical state encodings and therefore identical state
//! hashes. Everything that feeds a digest iterates `BTreeMap`s or sorts
//! explicitly; every wire artifact goes through the canonical codec.
//!
//! # A tour
//!
//! ```ignore
//! let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
//! let graph = WarpGraph::open(store, "social", OpenOptions::default()).await?;
//!
//! graph
//!     .patch(|p| {
//!         p.add_node("user:alice")?
//!             .add_node("project:alpha")?
//!             .add_edge("user:alice", "project:alpha", "member")?
//!             .set_property("user:alice", "weight", 0.8)?;
//!         Ok(())
//!     })
//!     .await?;
//!
//! let snapshot = graph.materialize().await?;
//! assert!(snapshot.has_edge("user:alice", "project:alpha", "member"));
//! ```
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

mod builder;
mod chain;
mod checkpoint;
mod config;
mod error;
mod event;
mod heap;
mod ident;
mod op;
mod patch;
mod query;
mod reducer;
mod refs;
mod seek;
mod serial;
mod snapshot;
mod state;
mod sync;
mod traverse;
mod warp_graph;
mod weighted;

// Re-exports for the stable public API.

/// Fluent patch accumulator; `commit()` is the sole suspension point.
pub use builder::PatchBuilder;
/// Checkpoint blobs, frontiers, and discovery.
pub use checkpoint::{
    decode_checkpoint, encode_checkpoint, find_best_checkpoint, publish_checkpoint, Checkpoint,
    Frontier, CHECKPOINT_SCHEMA_VERSION,
};
/// Writer-identity persistence (platform config dir or custom root).
pub use config::WriterConfigStore;
/// Error taxonomy shared by every operation.
pub use error::WarpError;
/// Causal event identifiers with the reducer's total order.
pub use event::{next_lamport, EventId};
/// Priority queue with stable tie-breaking.
pub use heap::MinHeap;
/// Writer and graph identifiers.
pub use ident::{GraphName, WriterId};
/// Graph operations and property values.
pub use op::{EdgeKey, Operation, PropScope, PropValue};
/// Patch envelope and wire codec.
pub use patch::{Patch, PatchError, PATCH_SCHEMA_VERSION};
/// Pull-based query pipeline.
pub use query::{QueryBuilder, QueryNode, QueryResult};
/// Deterministic CRDT fold.
pub use reducer::reduce;
/// Ref-name layout under the per-graph namespace.
pub use refs::{RefLayout, DEFAULT_ROOT};
/// State serialization and hashing.
pub use serial::{
    decode_state, encode_state, hash_state_bytes, state_hash, StateCodecError, StateHash,
    STATE_SCHEMA_VERSION,
};
/// Immutable read view with adjacency.
pub use snapshot::Snapshot;
/// OR-Set/LWW materialized state.
pub use state::{ElementState, GraphState, PropEntry};
/// Materialization outcome metadata.
pub use sync::SyncOutcome;
/// Unweighted traversals.
pub use traverse::{Bfs, Dfs, Direction, PathResult};
/// The facade.
pub use warp_graph::{OpenOptions, WarpGraph, WriterIdentity};
/// Weighted search with async providers.
pub use weighted::{HeuristicProvider, WeightProvider, WeightedPath};
