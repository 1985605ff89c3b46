// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Ref-name layout under the per-graph namespace.
//!
//! All refs live under `<root>/<graph>/…`:
//!
//! - `writers/<writerId>` — one chain head per writer
//! - `checkpoints/<n>` — published checkpoints, monotonically numbered
//! - `seek-cache/<key>` — cached snapshots for ceiling reads
//!
//! Writer ids and graph names are validated ref path segments, so layout
//! computation is pure string assembly.

use crate::ident::{GraphName, WriterId};

/// Default root prefix for all WarpGraph refs.
pub const DEFAULT_ROOT: &str = "warp";

/// Computes ref names for one graph under one root prefix.
#[derive(Clone, Debug)]
pub struct RefLayout {
    root: String,
    graph: GraphName,
}

impl RefLayout {
    /// Create a layout for `graph` under `root`.
    pub fn new(root: impl Into<String>, graph: GraphName) -> Self {
        Self {
            root: root.into(),
            graph,
        }
    }

    /// The graph this layout addresses.
    pub fn graph(&self) -> &GraphName {
        &self.graph
    }

    /// Prefix under which all writer chain heads live.
    pub fn writers_prefix(&self) -> String {
        format!("{}/{}/writers/", self.root, self.graph)
    }

    /// Chain-head ref for one writer.
    pub fn writer_ref(&self, writer: &WriterId) -> String {
        format!("{}{}", self.writers_prefix(), writer)
    }

    /// Prefix under which all checkpoints live.
    pub fn checkpoints_prefix(&self) -> String {
        format!("{}/{}/checkpoints/", self.root, self.graph)
    }

    /// Ref of the `n`-th checkpoint.
    pub fn checkpoint_ref(&self, n: u64) -> String {
        format!("{}{n}", self.checkpoints_prefix())
    }

    /// Prefix under which seek-cache entries live.
    pub fn seek_cache_prefix(&self) -> String {
        format!("{}/{}/seek-cache/", self.root, self.graph)
    }

    /// Ref of one seek-cache entry.
    pub fn seek_cache_ref(&self, key: &str) -> String {
        format!("{}{key}", self.seek_cache_prefix())
    }

    /// Recover a writer id from a full writer ref name.
    ///
    /// Returns `None` for names outside the writers namespace or with an
    /// undecodable suffix — discovery skips those instead of failing.
    pub fn writer_from_ref(&self, name: &str) -> Option<WriterId> {
        let suffix = name.strip_prefix(&self.writers_prefix())?;
        WriterId::parse(suffix).ok()
    }

    /// Recover a checkpoint index from a full checkpoint ref name.
    pub fn checkpoint_index(&self, name: &str) -> Option<u64> {
        name.strip_prefix(&self.checkpoints_prefix())?.parse().ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn layout() -> RefLayout {
        RefLayout::new(DEFAULT_ROOT, GraphName::parse("social").unwrap())
    }

    #[test]
    fn writer_refs_round_trip() {
        let layout = layout();
        let writer = WriterId::parse("alice").unwrap();
        let name = layout.writer_ref(&writer);
        assert_eq!(name, "warp/social/writers/alice");
        assert_eq!(layout.writer_from_ref(&name), Some(writer));
    }

    #[test]
    fn foreign_refs_are_skipped() {
        let layout = layout();
        assert_eq!(layout.writer_from_ref("warp/social/checkpoints/1"), None);
        assert_eq!(layout.writer_from_ref("warp/other/writers/alice"), None);
    }

    #[test]
    fn checkpoint_index_parses() {
        let layout = layout();
        let name = layout.checkpoint_ref(17);
        assert_eq!(name, "warp/social/checkpoints/17");
        assert_eq!(layout.checkpoint_index(&name), Some(17));
        assert_eq!(layout.checkpoint_index("warp/social/checkpoints/x"), None);
    }

    #[test]
    fn seek_cache_refs() {
        let layout = layout();
        assert_eq!(
            layout.seek_cache_ref("abc123"),
            "warp/social/seek-cache/abc123"
        );
    }
}
