// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Causal event identifiers.
//!
//! Every operation folded into a state carries an [`EventId`]: the owning
//! patch's lamport clock, the writer id, and the operation's index within
//! the patch. The derived total order — lamport, then writer bytes, then
//! seq — is the *only* ordering the reducer consults, which is what makes
//! the fold independent of patch arrival order.

use crate::ident::WriterId;

/// Totally ordered causal event identifier.
///
/// The derived `Ord` is the causal order: `lamport` ascending, then writer id
/// in byte order, then `seq` ascending. Field order matters; do not reorder.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EventId {
    /// Writer-local logical clock of the owning patch.
    pub lamport: u64,
    /// Writer that emitted the patch.
    pub writer: WriterId,
    /// Index of the operation within the patch.
    pub seq: u32,
}

impl EventId {
    /// Construct an event id.
    pub fn new(lamport: u64, writer: WriterId, seq: u32) -> Self {
        Self {
            lamport,
            writer,
            seq,
        }
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}#{}", self.writer, self.lamport, self.seq)
    }
}

/// Advance a writer's logical clock: `1 + max(local, observed)`.
///
/// Called before a patch is committed, with `observed` being the largest
/// lamport seen across all materialized patches.
pub fn next_lamport(local: u64, observed: u64) -> u64 {
    1 + local.max(observed)
}
