// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Graph operations: the tagged variants a patch carries.
//!
//! Operations are sum types with exhaustive dispatch so that an unknown
//! wire tag fails loudly at the decode boundary instead of silently inside
//! the reducer.

use bytes::Bytes;
use warp_store::ObjectId;

/// Inline property value, or a content-addressed reference to a blob that
/// is too large (or too shared) to inline.
#[derive(Clone, PartialEq, Debug)]
pub enum PropValue {
    /// UTF-8 text.
    Text(String),
    /// Signed integer. Integral numbers always take this lane — the
    /// canonical codec folds integral floats into integers, so a `Float`
    /// carrying `2.0` would not survive a wire round-trip.
    Int(i64),
    /// Non-integral finite float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Explicit null (distinct from the property being absent).
    Null,
    /// Opaque byte string.
    Bytes(Bytes),
    /// Content-addressed reference to an external blob.
    BlobRef(ObjectId),
}

impl PropValue {
    /// Build a numeric value, normalizing integral floats into the integer
    /// lane so the value round-trips through the canonical codec unchanged.
    pub fn number(f: f64) -> Self {
        if f.is_finite() && f.fract() == 0.0 {
            let i = f as i64;
            if i as f64 == f {
                return Self::Int(i);
            }
        }
        Self::Float(f)
    }

    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for PropValue {
    fn from(f: f64) -> Self {
        Self::number(f)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Identity of a directed labeled edge.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EdgeKey {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
    /// Edge label; `(from, to, label)` is the full identity.
    pub label: String,
}

impl EdgeKey {
    /// Construct an edge key.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: label.into(),
        }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.label, self.to)
    }
}

/// What a property is attached to.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PropScope {
    /// A node property.
    Node {
        /// Owning node id.
        id: String,
    },
    /// An edge property.
    Edge {
        /// Owning edge identity.
        key: EdgeKey,
    },
}

/// One graph operation inside a patch.
#[derive(Clone, PartialEq, Debug)]
pub enum Operation {
    /// Assert a node into the OR-Set.
    NodeAdd {
        /// Node id.
        id: String,
    },
    /// Tombstone every node add observed so far.
    NodeRemove {
        /// Node id.
        id: String,
    },
    /// Assert an edge into the OR-Set.
    EdgeAdd {
        /// Edge identity.
        key: EdgeKey,
    },
    /// Tombstone every edge add observed so far.
    EdgeRemove {
        /// Edge identity.
        key: EdgeKey,
    },
    /// Last-writer-wins property write on a node or edge.
    PropSet {
        /// Owner of the property.
        scope: PropScope,
        /// Property key.
        key: String,
        /// New value.
        value: PropValue,
    },
}
