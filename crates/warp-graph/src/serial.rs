// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! State serialization and the state hash.
//!
//! A state canonicalizes to the CBOR document
//! `{v, n: [...], e: [...], np: [...], ep: [...]}` with every list emitted
//! in sorted key order (free, because the state's maps are `BTreeMap`s).
//! The state hash is BLAKE3 over a domain prefix plus those bytes; two
//! peers that materialized the same patch set produce byte-identical
//! encodings and therefore identical hashes.

use blake3::Hasher;
use warp_canon::{DecodeError, EncodeError, Value};

use crate::event::EventId;
use crate::ident::WriterId;
use crate::op::{EdgeKey, PropValue};
use crate::state::{ElementState, GraphState, PropEntry};
use warp_store::ObjectId;

/// Wire schema version of serialized states.
pub const STATE_SCHEMA_VERSION: u64 = 1;

/// Domain prefix bound into the state hash.
const STATE_HASH_DOMAIN: &[u8] = b"warp/state/v1";

/// 32-byte BLAKE3 state digest.
pub type StateHash = [u8; 32];

/// Failures while decoding a serialized state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateCodecError {
    /// Unsupported schema version.
    #[error("unsupported state schema version {0}")]
    SchemaVersion(u64),
    /// Structurally malformed document.
    #[error("malformed state document: {0}")]
    Invalid(&'static str),
    /// The payload was not canonical CBOR.
    #[error("canonical decode: {0}")]
    Canon(#[from] DecodeError),
}

/// Canonically encode a state.
///
/// # Errors
/// Propagates [`EncodeError`] (only reachable via non-finite floats in
/// property values, which the patch boundary already rejects).
pub fn encode_state(state: &GraphState) -> Result<Vec<u8>, EncodeError> {
    let nodes: Vec<Value> = state
        .nodes
        .iter()
        .map(|(id, el)| Value::Array(vec![text(id), element(el)]))
        .collect();
    let edges: Vec<Value> = state
        .edges
        .iter()
        .map(|(key, el)| Value::Array(vec![edge_key(key), element(el)]))
        .collect();
    let node_props: Vec<Value> = state
        .node_props
        .iter()
        .map(|((id, prop), entry)| {
            Value::Array(vec![text(id), text(prop), event(&entry.event), value(&entry.value)])
        })
        .collect();
    let edge_props: Vec<Value> = state
        .edge_props
        .iter()
        .map(|((key, prop), entry)| {
            Value::Array(vec![
                edge_key(key),
                text(prop),
                event(&entry.event),
                value(&entry.value),
            ])
        })
        .collect();
    let doc = Value::Map(vec![
        (text("v"), Value::Integer(STATE_SCHEMA_VERSION.into())),
        (text("n"), Value::Array(nodes)),
        (text("e"), Value::Array(edges)),
        (text("np"), Value::Array(node_props)),
        (text("ep"), Value::Array(edge_props)),
    ]);
    warp_canon::encode(&doc)
}

/// Decode a serialized state.
///
/// # Errors
/// [`StateCodecError`] on malformed or non-canonical input.
pub fn decode_state(bytes: &[u8]) -> Result<GraphState, StateCodecError> {
    let doc = warp_canon::decode(bytes)?;
    let Value::Map(entries) = &doc else {
        return Err(StateCodecError::Invalid("document"));
    };
    let version = match field(entries, "v") {
        Some(Value::Integer(n)) => {
            u64::try_from(i128::from(*n)).map_err(|_| StateCodecError::Invalid("v"))?
        }
        _ => return Err(StateCodecError::Invalid("v")),
    };
    if version != STATE_SCHEMA_VERSION {
        return Err(StateCodecError::SchemaVersion(version));
    }

    let mut state = GraphState::new();
    for row in req_array(entries, "n")? {
        let cells = as_array(row, "n")?;
        let [id, el] = cells else {
            return Err(StateCodecError::Invalid("n"));
        };
        state
            .nodes
            .insert(as_text(id, "n")?.to_owned(), parse_element(el)?);
    }
    for row in req_array(entries, "e")? {
        let cells = as_array(row, "e")?;
        let [key, el] = cells else {
            return Err(StateCodecError::Invalid("e"));
        };
        state.edges.insert(parse_edge_key(key)?, parse_element(el)?);
    }
    for row in req_array(entries, "np")? {
        let cells = as_array(row, "np")?;
        let [id, prop, ev, val] = cells else {
            return Err(StateCodecError::Invalid("np"));
        };
        state.node_props.insert(
            (as_text(id, "np")?.to_owned(), as_text(prop, "np")?.to_owned()),
            PropEntry {
                event: parse_event(ev)?,
                value: parse_value(val)?,
            },
        );
    }
    for row in req_array(entries, "ep")? {
        let cells = as_array(row, "ep")?;
        let [key, prop, ev, val] = cells else {
            return Err(StateCodecError::Invalid("ep"));
        };
        state.edge_props.insert(
            (parse_edge_key(key)?, as_text(prop, "ep")?.to_owned()),
            PropEntry {
                event: parse_event(ev)?,
                value: parse_value(val)?,
            },
        );
    }
    Ok(state)
}

/// BLAKE3 digest of the canonical state bytes.
pub fn hash_state_bytes(bytes: &[u8]) -> StateHash {
    let mut hasher = Hasher::new();
    hasher.update(STATE_HASH_DOMAIN);
    hasher.update(bytes);
    *hasher.finalize().as_bytes()
}

/// Convenience: encode then hash.
///
/// # Errors
/// Propagates [`EncodeError`] from [`encode_state`].
pub fn state_hash(state: &GraphState) -> Result<StateHash, EncodeError> {
    Ok(hash_state_bytes(&encode_state(state)?))
}

// ── value builders ──────────────────────────────────────────────────────

fn text(s: &str) -> Value {
    Value::Text(s.to_owned())
}

fn element(el: &ElementState) -> Value {
    Value::Array(vec![
        el.max_add.as_ref().map_or(Value::Null, event),
        el.max_tomb.as_ref().map_or(Value::Null, event),
        Value::Integer(el.generation.into()),
    ])
}

fn event(ev: &EventId) -> Value {
    Value::Array(vec![
        Value::Integer(ev.lamport.into()),
        text(ev.writer.as_str()),
        Value::Integer(ev.seq.into()),
    ])
}

fn edge_key(key: &EdgeKey) -> Value {
    Value::Array(vec![text(&key.from), text(&key.to), text(&key.label)])
}

fn value(v: &PropValue) -> Value {
    match v {
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

// ── value parsers ───────────────────────────────────────────────────────

fn field<'a>(entries: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    entries.iter().find_map(|(k, v)| match k {
        Value::Text(t) if t == name => Some(v),
        _ => None,
    })
}

fn req_array<'a>(
    entries: &'a [(Value, Value)],
    name: &'static str,
) -> Result<&'a [Value], StateCodecError> {
    match field(entries, name) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(StateCodecError::Invalid(name)),
    }
}

fn as_array<'a>(v: &'a Value, what: &'static str) -> Result<&'a [Value], StateCodecError> {
    match v {
        Value::Array(items) => Ok(items),
        _ => Err(StateCodecError::Invalid(what)),
    }
}

fn as_text<'a>(v: &'a Value, what: &'static str) -> Result<&'a str, StateCodecError> {
    match v {
        Value::Text(t) => Ok(t),
        _ => Err(StateCodecError::Invalid(what)),
    }
}

fn as_u64(v: &Value, what: &'static str) -> Result<u64, StateCodecError> {
    match v {
        Value::Integer(n) => {
            u64::try_from(i128::from(*n)).map_err(|_| StateCodecError::Invalid(what))
        }
        _ => Err(StateCodecError::Invalid(what)),
    }
}

fn parse_element(v: &Value) -> Result<ElementState, StateCodecError> {
    let cells = as_array(v, "element")?;
    let [add, tomb, generation] = cells else {
        return Err(StateCodecError::Invalid("element"));
    };
    Ok(ElementState {
        max_add: parse_opt_event(add)?,
        max_tomb: parse_opt_event(tomb)?,
        generation: as_u64(generation, "element")?,
    })
}

fn parse_opt_event(v: &Value) -> Result<Option<EventId>, StateCodecError> {
    match v {
        Value::Null => Ok(None),
        other => Ok(Some(parse_event(other)?)),
    }
}

fn parse_event(v: &Value) -> Result<EventId, StateCodecError> {
    let cells = as_array(v, "event")?;
    let [lamport, writer, seq] = cells else {
        return Err(StateCodecError::Invalid("event"));
    };
    let writer =
        WriterId::parse(as_text(writer, "event")?).map_err(|_| StateCodecError::Invalid("event"))?;
    let seq = u32::try_from(as_u64(seq, "event")?).map_err(|_| StateCodecError::Invalid("event"))?;
    Ok(EventId::new(as_u64(lamport, "event")?, writer, seq))
}

fn parse_edge_key(v: &Value) -> Result<EdgeKey, StateCodecError> {
    let cells = as_array(v, "edge-key")?;
    let [from, to, label] = cells else {
        return Err(StateCodecError::Invalid("edge-key"));
    };
    Ok(EdgeKey::new(
        as_text(from, "edge-key")?,
        as_text(to, "edge-key")?,
        as_text(label, "edge-key")?,
    ))
}

fn parse_value(v: &Value) -> Result<PropValue, StateCodecError> {
    match v {
        Value::Text(s) => Ok(PropValue::Text(s.clone())),
        Value::Integer(n) => i64::try_from(i128::from(*n))
            .map(PropValue::Int)
            .map_err(|_| StateCodecError::Invalid("value")),
        Value::Float(f) => Ok(PropValue::Float(*f)),
        Value::Bool(b) => Ok(PropValue::Bool(*b)),
        Value::Null => Ok(PropValue::Null),
        Value::Bytes(b) => Ok(PropValue::Bytes(bytes::Bytes::from(b.clone()))),
        Value::Map(entries) => {
            let Some(Value::Bytes(raw)) = field(entries, "r") else {
                return Err(StateCodecError::Invalid("value"));
            };
            let id: [u8; 32] = raw
                .as_slice()
                .try_into()
                .map_err(|_| StateCodecError::Invalid("value"))?;
            Ok(PropValue::BlobRef(ObjectId(id)))
        }
        _ => Err(StateCodecError::Invalid("value")),
    }
}
