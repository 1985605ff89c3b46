// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Shared helpers for warp-graph integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::Arc;

use warp_graph::{OpenOptions, WarpGraph, WriterId};
use warp_store::{MemoryStore, ObjectStore};

/// One shared in-memory store.
pub fn store() -> Arc<dyn ObjectStore> {
    Arc::new(MemoryStore::new())
}

/// Open `graph` on `store` with an explicit writer id (no config-dir I/O).
pub async fn open_as(store: &Arc<dyn ObjectStore>, graph: &str, writer: &str) -> WarpGraph {
    WarpGraph::open(
        Arc::clone(store),
        graph,
        OpenOptions::default().writer(WriterId::parse(writer).unwrap()),
    )
    .await
    .unwrap()
}
