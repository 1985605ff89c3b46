// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! The WarpGraph facade: one handle per `(store, graph, writer)`.
//!
//! The handle owns the writer's chain cache and the materialized-snapshot
//! cache, both behind async mutexes — a single handle never races itself
//! (the cooperative model: at most one in-flight materialize, commit, or
//! query per handle), while snapshot reads hand out `Arc`s that remain
//! valid however the cache moves on.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use warp_store::{ObjectId, ObjectStore, PingReport};

use crate::builder::{ChainState, PatchBuilder};
use crate::checkpoint::{self, Frontier};
use crate::config::WriterConfigStore;
use crate::error::WarpError;
use crate::ident::{GraphName, WriterId};
use crate::op::{EdgeKey, PropValue};
use crate::patch::Patch;
use crate::query::QueryBuilder;
use crate::refs::{RefLayout, DEFAULT_ROOT};
use crate::seek;
use crate::serial::StateHash;
use crate::snapshot::Snapshot;
use crate::sync;

/// How `open` resolves the local writer identity.
#[derive(Debug, Default)]
pub enum WriterIdentity {
    /// Load the persisted id for this graph, generating and persisting one
    /// on first use (the platform config dir, or a custom store).
    #[default]
    Persistent,
    /// Use exactly this id; nothing is persisted.
    Explicit(WriterId),
    /// Generate a throwaway id for this handle only.
    Ephemeral,
}

/// Options for [`WarpGraph::open`].
#[derive(Debug)]
pub struct OpenOptions {
    /// Writer identity resolution.
    pub identity: WriterIdentity,
    /// Custom identity store (defaults to the platform config dir).
    pub config: Option<WriterConfigStore>,
    /// Re-materialize on every read instead of serving the cached snapshot.
    pub auto_materialize: bool,
    /// Root prefix for all refs.
    pub root: String,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            identity: WriterIdentity::Persistent,
            config: None,
            auto_materialize: false,
            root: DEFAULT_ROOT.to_owned(),
        }
    }
}

impl OpenOptions {
    /// Use exactly this writer id.
    pub fn writer(mut self, writer: WriterId) -> Self {
        self.identity = WriterIdentity::Explicit(writer);
        self
    }

    /// Use a throwaway writer id for this handle.
    pub fn ephemeral(mut self) -> Self {
        self.identity = WriterIdentity::Ephemeral;
        self
    }

    /// Persist identities through `config` instead of the platform dir.
    pub fn config(mut self, config: WriterConfigStore) -> Self {
        self.config = Some(config);
        self
    }

    /// Re-materialize on every read.
    pub fn auto_materialize(mut self, on: bool) -> Self {
        self.auto_materialize = on;
        self
    }

    /// Override the ref root prefix.
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }
}

#[derive(Default)]
struct ViewState {
    snapshot: Option<Arc<Snapshot>>,
    frontier: Option<Frontier>,
}

/// Handle to one graph in one object store, as one writer.
pub struct WarpGraph {
    store: Arc<dyn ObjectStore>,
    layout: RefLayout,
    writer: WriterId,
    auto_materialize: bool,
    chain: Arc<Mutex<ChainState>>,
    view: Mutex<ViewState>,
}

impl WarpGraph {
    /// Open a graph handle.
    ///
    /// Resolves the writer identity, loads the writer's chain head (and the
    /// lamport of the patch there, to seed the local clock), and returns a
    /// handle ready for patches and reads.
    ///
    /// # Errors
    /// Invalid graph name, identity-persistence failures, store failures,
    /// or a corrupt patch at the writer's own head.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        graph: &str,
        options: OpenOptions,
    ) -> Result<Self, WarpError> {
        let graph = GraphName::parse(graph)?;
        let writer = match options.identity {
            WriterIdentity::Explicit(writer) => writer,
            WriterIdentity::Ephemeral => WriterId::generate(),
            WriterIdentity::Persistent => match options.config {
                Some(config) => config.load_or_create(&graph)?,
                None => WriterConfigStore::new()?.load_or_create(&graph)?,
            },
        };
        let layout = RefLayout::new(options.root, graph);

        let mut chain = ChainState::default();
        if let Some(head) = store.read_ref(&layout.writer_ref(&writer)).await? {
            let payload = store.show_commit(head).await?;
            let patch = Patch::decode(&payload).map_err(|cause| WarpError::CorruptPatch {
                commit_id: head,
                cause: cause.to_string(),
            })?;
            chain.head = Some(head);
            chain.lamport = patch.lamport;
        }
        debug!(graph = %layout.graph(), writer = %writer, "opened graph handle");

        Ok(Self {
            store,
            layout,
            writer,
            auto_materialize: options.auto_materialize,
            chain: Arc::new(Mutex::new(chain)),
            view: Mutex::new(ViewState::default()),
        })
    }

    /// This handle's writer id.
    pub fn writer_id(&self) -> &WriterId {
        &self.writer
    }

    /// The graph this handle addresses.
    pub fn graph(&self) -> &GraphName {
        self.layout.graph()
    }

    // ── write side ───────────────────────────────────────────────────────

    /// Fresh patch builder bound to this writer's chain.
    pub fn create_patch(&self) -> PatchBuilder {
        PatchBuilder::new(
            Arc::clone(&self.store),
            self.layout.writer_ref(&self.writer),
            self.writer.clone(),
            Arc::clone(&self.chain),
        )
    }

    /// Build and commit one patch in a closure.
    ///
    /// # Errors
    /// Whatever the closure returns, plus commit failures.
    pub async fn patch<F>(&self, build: F) -> Result<ObjectId, WarpError>
    where
        F: FnOnce(&mut PatchBuilder) -> Result<(), WarpError>,
    {
        let mut builder = self.create_patch();
        build(&mut builder)?;
        builder.commit().await
    }

    // ── materialization ──────────────────────────────────────────────────

    /// Materialize the merged state of all writers and cache the snapshot.
    ///
    /// # Errors
    /// Store failures and [`WarpError::CorruptPatch`].
    pub async fn materialize(&self) -> Result<Arc<Snapshot>, WarpError> {
        self.materialize_with(&CancellationToken::new()).await
    }

    /// [`materialize`](Self::materialize) with a cancellation signal.
    ///
    /// # Errors
    /// Additionally [`WarpError::Cancelled`].
    pub async fn materialize_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<Snapshot>, WarpError> {
        // The view lock also serializes materialize passes per handle.
        let mut view = self.view.lock().await;
        let outcome = sync::materialize(&*self.store, &self.layout, cancel).await?;
        self.chain.lock().await.observed = outcome.state.max_lamport();
        let snapshot = Arc::new(Snapshot::build(outcome.state)?);
        view.snapshot = Some(Arc::clone(&snapshot));
        view.frontier = Some(outcome.frontier);
        Ok(snapshot)
    }

    /// Materialize the state as of a lamport `ceiling` (time-travel read).
    ///
    /// Served from the seek cache when the `(ceiling, frontier)` pair was
    /// computed before; otherwise a full filtered replay runs and the
    /// result is cached. The handle's current-snapshot cache is untouched.
    ///
    /// # Errors
    /// Store failures, [`WarpError::CorruptPatch`], cancellation.
    pub async fn materialize_at(&self, ceiling: u64) -> Result<Arc<Snapshot>, WarpError> {
        let cancel = CancellationToken::new();
        let heads = sync::collect_writer_heads(&*self.store, &self.layout).await?;
        let frontier = Frontier(heads.clone());
        let key = seek::seek_key(ceiling, &frontier);
        if let Some(state) = seek::load(&*self.store, &self.layout, &key).await? {
            debug!(ceiling, key = %key, "seek cache hit");
            return Ok(Arc::new(Snapshot::build(state)?));
        }
        let outcome =
            sync::materialize_at(&*self.store, &self.layout, heads, ceiling, &cancel).await?;
        seek::save(&*self.store, &self.layout, &key, &outcome.state).await?;
        Ok(Arc::new(Snapshot::build(outcome.state)?))
    }

    /// The current snapshot: cached unless `auto_materialize` is on or no
    /// materialize has run yet.
    ///
    /// # Errors
    /// Materialization failures.
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>, WarpError> {
        if !self.auto_materialize {
            let view = self.view.lock().await;
            if let Some(snapshot) = &view.snapshot {
                return Ok(Arc::clone(snapshot));
            }
        }
        self.materialize().await
    }

    // ── read side ────────────────────────────────────────────────────────

    /// Alive node ids, sorted.
    ///
    /// # Errors
    /// Materialization failures.
    pub async fn get_nodes(&self) -> Result<Vec<String>, WarpError> {
        Ok(self.snapshot().await?.nodes())
    }

    /// Alive edges, sorted.
    ///
    /// # Errors
    /// Materialization failures.
    pub async fn get_edges(&self) -> Result<Vec<EdgeKey>, WarpError> {
        Ok(self.snapshot().await?.edges())
    }

    /// Visible properties of a node.
    ///
    /// # Errors
    /// Materialization failures.
    pub async fn get_node_props(
        &self,
        id: &str,
    ) -> Result<BTreeMap<String, PropValue>, WarpError> {
        Ok(self.snapshot().await?.node_props(id))
    }

    /// Visible properties of an edge.
    ///
    /// # Errors
    /// Materialization failures.
    pub async fn get_edge_props(
        &self,
        from: &str,
        to: &str,
        label: &str,
    ) -> Result<BTreeMap<String, PropValue>, WarpError> {
        Ok(self.snapshot().await?.edge_props(from, to, label))
    }

    /// Whether the node is alive.
    ///
    /// # Errors
    /// Materialization failures.
    pub async fn has_node(&self, id: &str) -> Result<bool, WarpError> {
        Ok(self.snapshot().await?.has_node(id))
    }

    /// Whether the edge is alive.
    ///
    /// # Errors
    /// Materialization failures.
    pub async fn has_edge(&self, from: &str, to: &str, label: &str) -> Result<bool, WarpError> {
        Ok(self.snapshot().await?.has_edge(from, to, label))
    }

    /// Hash of the current snapshot's canonical state.
    ///
    /// # Errors
    /// Materialization failures.
    pub async fn state_hash(&self) -> Result<StateHash, WarpError> {
        Ok(self.snapshot().await?.state_hash())
    }

    /// Writer ids currently present in the graph.
    ///
    /// # Errors
    /// Store failures.
    pub async fn discover_writers(&self) -> Result<Vec<WriterId>, WarpError> {
        let heads = sync::collect_writer_heads(&*self.store, &self.layout).await?;
        Ok(heads.into_keys().collect())
    }

    /// Query builder over the current snapshot.
    ///
    /// # Errors
    /// Materialization failures.
    pub async fn query(&self) -> Result<QueryBuilder, WarpError> {
        Ok(QueryBuilder::new(self.snapshot().await?))
    }

    // ── checkpoints & health ─────────────────────────────────────────────

    /// Publish a checkpoint of the current snapshot and its frontier.
    ///
    /// Materializes first when no snapshot is cached. Returns the
    /// checkpoint index and blob id.
    ///
    /// # Errors
    /// Materialization and store failures.
    pub async fn publish_checkpoint(&self) -> Result<(u64, ObjectId), WarpError> {
        self.publish_checkpoint_with(&CancellationToken::new()).await
    }

    /// [`publish_checkpoint`](Self::publish_checkpoint) with a cancellation
    /// signal.
    ///
    /// # Errors
    /// Additionally [`WarpError::Cancelled`].
    pub async fn publish_checkpoint_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(u64, ObjectId), WarpError> {
        {
            let view = self.view.lock().await;
            if let (Some(snapshot), Some(frontier)) = (&view.snapshot, &view.frontier) {
                return checkpoint::publish_checkpoint(
                    &*self.store,
                    &self.layout,
                    snapshot.state(),
                    frontier,
                    cancel,
                )
                .await;
            }
        }
        let snapshot = self.materialize_with(cancel).await?;
        let view = self.view.lock().await;
        let frontier = view.frontier.clone().unwrap_or_default();
        checkpoint::publish_checkpoint(
            &*self.store,
            &self.layout,
            snapshot.state(),
            &frontier,
            cancel,
        )
        .await
    }

    /// Number of patches in this writer's own chain.
    ///
    /// # Errors
    /// Store failures.
    pub async fn writer_chain_length(&self) -> Result<u64, WarpError> {
        let name = self.layout.writer_ref(&self.writer);
        match self.store.read_ref(&name).await? {
            None => Ok(0),
            Some(_) => Ok(self.store.count_reachable(&name).await?),
        }
    }

    /// Probe the object store.
    ///
    /// # Errors
    /// Store failures.
    pub async fn ping_store(&self) -> Result<PingReport, WarpError> {
        Ok(self.store.ping().await?)
    }
}
