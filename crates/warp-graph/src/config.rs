// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Writer-identity persistence.
//!
//! A writer id, once chosen for a `(graph, local identity)` pair, must
//! never change — otherwise the writer would fork its own chain. The store
//! keeps one flat file per graph under the platform config directory
//! (e.g. `~/.config/warpgraph/<graph>.writer-id`) holding just the id
//! string.

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::WarpError;
use crate::ident::{GraphName, WriterId};

/// Filesystem store for per-graph writer ids.
#[derive(Debug, Clone)]
pub struct WriterConfigStore {
    base: PathBuf,
}

impl WriterConfigStore {
    /// Store rooted at the platform config directory.
    ///
    /// # Errors
    /// [`WarpError::ConfigRead`] when the platform config dir cannot be
    /// resolved or created.
    pub fn new() -> Result<Self, WarpError> {
        let dirs = ProjectDirs::from("dev", "warpgraph", "warpgraph")
            .ok_or_else(|| WarpError::ConfigRead("could not resolve config dir".into()))?;
        let base = dirs.config_dir().to_path_buf();
        fs::create_dir_all(&base).map_err(|e| WarpError::ConfigWrite(e.to_string()))?;
        Ok(Self { base })
    }

    /// Store rooted at an explicit directory (tests, embedded setups).
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn path_for(&self, graph: &GraphName) -> PathBuf {
        self.base.join(format!("{graph}.writer-id"))
    }

    /// Read the persisted writer id for `graph`, if one exists.
    ///
    /// # Errors
    /// [`WarpError::ConfigRead`] on I/O failure or a corrupt id.
    pub fn load(&self, graph: &GraphName) -> Result<Option<WriterId>, WarpError> {
        let path = self.path_for(graph);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(WarpError::ConfigRead(err.to_string())),
        };
        let id = WriterId::parse(raw.trim())
            .map_err(|err| WarpError::ConfigRead(format!("{}: {err}", path.display())))?;
        Ok(Some(id))
    }

    /// Persist the writer id for `graph`.
    ///
    /// # Errors
    /// [`WarpError::ConfigWrite`] on I/O failure.
    pub fn save(&self, graph: &GraphName, writer: &WriterId) -> Result<(), WarpError> {
        let path = self.path_for(graph);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| WarpError::ConfigWrite(e.to_string()))?;
        }
        fs::write(&path, format!("{writer}\n")).map_err(|e| WarpError::ConfigWrite(e.to_string()))
    }

    /// Load the persisted id or generate, persist, and return a fresh one.
    ///
    /// # Errors
    /// Propagates load/save failures.
    pub fn load_or_create(&self, graph: &GraphName) -> Result<WriterId, WarpError> {
        if let Some(existing) = self.load(graph)? {
            return Ok(existing);
        }
        let fresh = WriterId::generate();
        self.save(graph, &fresh)?;
        Ok(fresh)
    }
}
