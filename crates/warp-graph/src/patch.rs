// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Patch envelope and wire format.
//!
//! A patch is the atomic unit a writer commits: `{v, w, l, o}` canonically
//! encoded and stored as the payload of a single commit object whose parent
//! is the writer's previous chain head. Operation maps carry a short tag
//! (`na`, `nr`, `ea`, `er`, `ps`, `pe`); unknown tags are rejected here, at
//! the decode boundary, so they can never reach the reducer.

use bytes::Bytes;
use warp_canon::{DecodeError, EncodeError, Value};
use warp_store::ObjectId;

use crate::ident::WriterId;
use crate::op::{EdgeKey, Operation, PropScope, PropValue};

/// Wire schema version of the patch envelope.
pub const PATCH_SCHEMA_VERSION: u64 = 1;

/// A decoded patch: one writer's atomic batch of operations.
#[derive(Clone, PartialEq, Debug)]
pub struct Patch {
    /// Writer that committed the patch.
    pub writer: WriterId,
    /// The writer's lamport clock value for this patch.
    pub lamport: u64,
    /// Operations in builder call order; index = event `seq`.
    pub ops: Vec<Operation>,
}

/// Failures while decoding a patch payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatchError {
    /// The envelope carried an unsupported schema version.
    #[error("unsupported patch schema version {0}")]
    SchemaVersion(u64),
    /// An operation carried a tag this implementation does not know.
    #[error("unknown op tag {0:?}")]
    UnknownOp(String),
    /// A required envelope or op field was absent.
    #[error("missing field {0:?}")]
    MissingField(&'static str),
    /// A field was present but malformed.
    #[error("invalid field {0:?}")]
    InvalidField(&'static str),
    /// The payload was not canonical CBOR.
    #[error("canonical decode: {0}")]
    Canon(#[from] DecodeError),
}

impl Patch {
    /// Canonically encode the envelope for committing.
    ///
    /// # Errors
    /// Propagates [`EncodeError`]; only reachable through a non-finite float
    /// smuggled into a property value.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let ops: Vec<Value> = self.ops.iter().map(encode_op).collect();
        let envelope = Value::Map(vec![
            (text("v"), Value::Integer(PATCH_SCHEMA_VERSION.into())),
            (text("w"), text(self.writer.as_str())),
            (text("l"), Value::Integer(self.lamport.into())),
            (text("o"), Value::Array(ops)),
        ]);
        Ok(Bytes::from(warp_canon::encode(&envelope)?))
    }

    /// Decode a patch payload.
    ///
    /// # Errors
    /// [`PatchError`] on non-canonical bytes, version or tag mismatches, and
    /// malformed fields.
    pub fn decode(bytes: &[u8]) -> Result<Self, PatchError> {
        let envelope = warp_canon::decode(bytes)?;
        let Value::Map(entries) = &envelope else {
            return Err(PatchError::InvalidField("envelope"));
        };
        let version = req_u64(entries, "v")?;
        if version != PATCH_SCHEMA_VERSION {
            return Err(PatchError::SchemaVersion(version));
        }
        let writer = WriterId::parse(req_text(entries, "w")?)
            .map_err(|_| PatchError::InvalidField("w"))?;
        let lamport = req_u64(entries, "l")?;
        let Some(Value::Array(raw_ops)) = field(entries, "o") else {
            return Err(PatchError::MissingField("o"));
        };
        let ops = raw_ops.iter().map(decode_op).collect::<Result<_, _>>()?;
        Ok(Self {
            writer,
            lamport,
            ops,
        })
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_owned())
}

fn field<'a>(entries: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    entries.iter().find_map(|(k, v)| match k {
        Value::Text(t) if t == name => Some(v),
        _ => None,
    })
}

fn req_text<'a>(entries: &'a [(Value, Value)], name: &'static str) -> Result<&'a str, PatchError> {
    match field(entries, name) {
        Some(Value::Text(t)) => Ok(t),
        Some(_) => Err(PatchError::InvalidField(name)),
        None => Err(PatchError::MissingField(name)),
    }
}

fn req_u64(entries: &[(Value, Value)], name: &'static str) -> Result<u64, PatchError> {
    match field(entries, name) {
        Some(Value::Integer(n)) => {
            u64::try_from(i128::from(*n)).map_err(|_| PatchError::InvalidField(name))
        }
        Some(_) => Err(PatchError::InvalidField(name)),
        None => Err(PatchError::MissingField(name)),
    }
}

fn encode_op(op: &Operation) -> Value {
    match op {
        Operation::NodeAdd { id } => Value::Map(vec![(text("t"), text("na")), (text("id"), text(id))]),
        Operation::NodeRemove { id } => {
            Value::Map(vec![(text("t"), text("nr")), (text("id"), text(id))])
        }
        Operation::EdgeAdd { key } => edge_op("ea", key, None),
        Operation::EdgeRemove { key } => edge_op("er", key, None),
        Operation::PropSet { scope, key, value } => match scope {
            PropScope::Node { id } => Value::Map(vec![
                (text("t"), text("ps")),
                (text("n"), text(id)),
                (text("k"), text(key)),
                (text("v"), encode_value(value)),
            ]),
            PropScope::Edge { key: edge } => {
                edge_op("pe", edge, Some((key.as_str(), encode_value(value))))
            }
        },
    }
}

fn edge_op(tag: &str, key: &EdgeKey, prop: Option<(&str, Value)>) -> Value {
    let mut entries = vec![
        (text("t"), text(tag)),
        (text("a"), text(&key.from)),
        (text("b"), text(&key.to)),
        (text("l"), text(&key.label)),
    ];
    if let Some((prop_key, value)) = prop {
        entries.push((text("k"), text(prop_key)));
        entries.push((text("v"), value));
    }
    Value::Map(entries)
}

fn encode_value(value: &PropValue) -> Value {
    match value {
        PropValue::Text(s) => text(s),
        PropValue::Int(i) => Value::Integer((*i).into()),
        PropValue::Float(f) => Value::Float(*f),
        PropValue::Bool(b) => Value::Bool(*b),
        PropValue::Null => Value::Null,
        PropValue::Bytes(b) => Value::Bytes(b.to_vec()),
        PropValue::BlobRef(id) => {
            Value::Map(vec![(text("r"), Value::Bytes(id.as_bytes().to_vec()))])
        }
    }
}

fn decode_op(raw: &Value) -> Result<Operation, PatchError> {
    let Value::Map(entries) = raw else {
        return Err(PatchError::InvalidField("op"));
    };
    let tag = req_text(entries, "t")?;
    match tag {
        "na" => Ok(Operation::NodeAdd {
            id: req_text(entries, "id")?.to_owned(),
        }),
        "nr" => Ok(Operation::NodeRemove {
            id: req_text(entries, "id")?.to_owned(),
        }),
        "ea" => Ok(Operation::EdgeAdd {
            key: decode_edge_key(entries)?,
        }),
        "er" => Ok(Operation::EdgeRemove {
            key: decode_edge_key(entries)?,
        }),
        "ps" => Ok(Operation::PropSet {
            scope: PropScope::Node {
                id: req_text(entries, "n")?.to_owned(),
            },
            key: req_text(entries, "k")?.to_owned(),
            value: decode_value(field(entries, "v").ok_or(PatchError::MissingField("v"))?)?,
        }),
        "pe" => Ok(Operation::PropSet {
            scope: PropScope::Edge {
                key: decode_edge_key(entries)?,
            },
            key: req_text(entries, "k")?.to_owned(),
            value: decode_value(field(entries, "v").ok_or(PatchError::MissingField("v"))?)?,
        }),
        other => Err(PatchError::UnknownOp(other.to_owned())),
    }
}

fn decode_edge_key(entries: &[(Value, Value)]) -> Result<EdgeKey, PatchError> {
    Ok(EdgeKey::new(
        req_text(entries, "a")?,
        req_text(entries, "b")?,
        req_text(entries, "l")?,
    ))
}

fn decode_value(raw: &Value) -> Result<PropValue, PatchError> {
    match raw {
        Value::Text(s) => Ok(PropValue::Text(s.clone())),
        Value::Integer(n) => i64::try_from(i128::from(*n))
            .map(PropValue::Int)
            .map_err(|_| PatchError::InvalidField("v")),
        Value::Float(f) => Ok(PropValue::Float(*f)),
        Value::Bool(b) => Ok(PropValue::Bool(*b)),
        Value::Null => Ok(PropValue::Null),
        Value::Bytes(b) => Ok(PropValue::Bytes(Bytes::from(b.clone()))),
        Value::Map(entries) => {
            let Some(Value::Bytes(raw_id)) = field(entries, "r") else {
                return Err(PatchError::InvalidField("v"));
            };
            let id: [u8; 32] = raw_id
                .as_slice()
                .try_into()
                .map_err(|_| PatchError::InvalidField("v"))?;
            Ok(PropValue::BlobRef(ObjectId(id)))
        }
        _ => Err(PatchError::InvalidField("v")),
    }
}
