// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Error taxonomy for the graph engine.

use thiserror::Error;
use warp_store::{ObjectId, StoreError};

/// Errors surfaced by WarpGraph operations.
#[derive(Debug, Error)]
pub enum WarpError {
    /// Malformed writer id, graph name, weight, or query pattern.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Unknown commit, ref, checkpoint, or graph element.
    #[error("not found: {0}")]
    NotFound(String),
    /// A patch commit failed to decode; fatal for materialization.
    ///
    /// Callers may quarantine the offending writer ref and retry.
    #[error("corrupt patch at commit {commit_id}: {cause}")]
    CorruptPatch {
        /// Commit whose payload failed to decode.
        commit_id: ObjectId,
        /// Decode failure detail.
        cause: String,
    },
    /// A published checkpoint failed to decode or verify.
    #[error("corrupt checkpoint {name}: {cause}")]
    CorruptCheckpoint {
        /// Ref name of the checkpoint.
        name: String,
        /// Failure detail.
        cause: String,
    },
    /// Ref compare-and-set kept failing after bounded retries.
    #[error("ref conflict: {0}")]
    Conflict(String),
    /// Caller timeout or explicit cancellation.
    #[error("operation cancelled")]
    Cancelled,
    /// A patch builder was used after `commit()`.
    #[error("patch already committed")]
    PatchFinalized,
    /// Topological sort reached a cycle.
    #[error("graph has a reachable cycle")]
    HasCycle,
    /// No path exists between the requested endpoints.
    #[error("no path between endpoints")]
    NoPath,
    /// A weight provider returned a negative or non-finite weight.
    #[error("invalid weight {weight} on edge {from} -> {to}")]
    InvalidWeight {
        /// Source node of the offending edge.
        from: String,
        /// Target node of the offending edge.
        to: String,
        /// The rejected weight.
        weight: f64,
    },
    /// Reading the persisted writer identity failed.
    #[error("config read failed: {0}")]
    ConfigRead(String),
    /// Writing the persisted writer identity failed.
    #[error("config write failed: {0}")]
    ConfigWrite(String),
    /// Object-store failure; retriable at the caller's discretion.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// An invariant the engine relies on was violated.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl From<warp_canon::EncodeError> for WarpError {
    fn from(err: warp_canon::EncodeError) -> Self {
        // Values built by this crate always encode; a failure here is a bug.
        Self::Internal(format!("canonical encode: {err}"))
    }
}
