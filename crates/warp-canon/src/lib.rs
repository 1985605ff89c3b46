// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Canonical deterministic CBOR codec for WarpGraph wire artifacts.
//!
//! Every byte sequence that participates in a WarpGraph digest — patch
//! envelopes, checkpoint blobs, serialized states — goes through this codec.
//! Two peers encoding the same logical value must produce identical bytes, so
//! the codec is a strict canonical subset of CBOR:
//!
//! - map keys are sorted by their encoded byte sequence, recursively, and
//!   duplicates are rejected;
//! - lengths are always definite; indefinite forms are rejected on decode;
//! - integers use the smallest width that fits, and the decoder rejects
//!   over-wide encodings;
//! - floats use the smallest of f16/f32/f64 that round-trips, and a float
//!   carrying an integral value is encoded as an integer;
//! - CBOR tags are not part of the subset.
//!
//! Failure is total: [`encode`] either returns the full canonical byte
//! sequence or an [`EncodeError`] with no partial output, and [`decode`]
//! rejects any input that a canonical encoder could not have produced.
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

mod decode;
mod encode;

pub use ciborium::value::{Integer, Value};
pub use decode::decode;
pub use encode::encode;

/// Errors produced while encoding a value into canonical bytes.
///
/// Encoding never leaves partial output behind: on error the caller receives
/// no bytes at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// CBOR tags are outside the canonical subset.
    #[error("cbor tags are not encodable in the canonical subset")]
    TagNotCanonical,
    /// Two map keys encoded to the same byte sequence.
    #[error("duplicate map key")]
    DuplicateMapKey,
    /// A `Value` variant with no canonical representation (reserved simple
    /// values, unknown extensions).
    #[error("value has no canonical representation: {0}")]
    Unrepresentable(String),
}

/// Errors produced while decoding canonical bytes back into a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Input ended before the value was complete.
    #[error("input truncated")]
    Truncated,
    /// Extra bytes remained after the single top-level value.
    #[error("trailing bytes after value")]
    TrailingBytes,
    /// A CBOR tag was encountered.
    #[error("cbor tag outside canonical subset")]
    TagNotCanonical,
    /// An indefinite-length item was encountered.
    #[error("indefinite length outside canonical subset")]
    IndefiniteLength,
    /// An integer (or length) was encoded wider than necessary.
    #[error("non-minimal integer width")]
    NonMinimalInt,
    /// A float was encoded wider than necessary.
    #[error("non-minimal float width")]
    NonMinimalFloat,
    /// A float carried an integral value that canonically must be an integer.
    #[error("integral value encoded as float")]
    IntegralFloat,
    /// Map keys were not in strictly increasing encoded-byte order.
    #[error("map keys out of canonical order")]
    MapKeyOrder,
    /// The same encoded key appeared twice in one map.
    #[error("duplicate map key")]
    DuplicateMapKey,
    /// A negative integer fell outside the representable range.
    #[error("integer out of range")]
    IntOutOfRange,
    /// Text bytes were not valid UTF-8.
    #[error("invalid utf-8 in text string")]
    InvalidUtf8,
    /// Any other malformed input.
    #[error("malformed input: {0}")]
    Malformed(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn roundtrip(v: &Value) -> Value {
        let bytes = encode(v).unwrap();
        decode(&bytes).unwrap()
    }

    #[test]
    fn map_keys_sort_by_encoded_bytes() {
        // Insertion order deliberately scrambled; output order must not care.
        let a = Value::Map(vec![
            (Value::Text("zz".into()), Value::Integer(1.into())),
            (Value::Text("a".into()), Value::Integer(2.into())),
            (Value::Text("m".into()), Value::Integer(3.into())),
        ]);
        let b = Value::Map(vec![
            (Value::Text("a".into()), Value::Integer(2.into())),
            (Value::Text("m".into()), Value::Integer(3.into())),
            (Value::Text("zz".into()), Value::Integer(1.into())),
        ]);
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    #[test]
    fn nested_maps_sort_recursively() {
        let inner = |order: bool| {
            let mut entries = vec![
                (Value::Text("x".into()), Value::Integer(1.into())),
                (Value::Text("b".into()), Value::Integer(2.into())),
            ];
            if order {
                entries.reverse();
            }
            Value::Map(entries)
        };
        let outer_a = Value::Map(vec![(Value::Text("k".into()), inner(false))]);
        let outer_b = Value::Map(vec![(Value::Text("k".into()), inner(true))]);
        assert_eq!(encode(&outer_a).unwrap(), encode(&outer_b).unwrap());
    }

    #[test]
    fn duplicate_keys_rejected_on_encode() {
        let v = Value::Map(vec![
            (Value::Text("k".into()), Value::Integer(1.into())),
            (Value::Text("k".into()), Value::Integer(2.into())),
        ]);
        assert_eq!(encode(&v), Err(EncodeError::DuplicateMapKey));
    }

    #[test]
    fn tags_rejected_on_encode() {
        let v = Value::Tag(2, Box::new(Value::Integer(1.into())));
        assert_eq!(encode(&v), Err(EncodeError::TagNotCanonical));
    }

    #[test]
    fn integral_float_encodes_as_integer() {
        let as_float = encode(&Value::Float(42.0)).unwrap();
        let as_int = encode(&Value::Integer(42.into())).unwrap();
        assert_eq!(as_float, as_int);
    }

    #[test]
    fn scalar_roundtrips() {
        for v in [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Integer(0.into()),
            Value::Integer((-1i64).into()),
            Value::Integer(u64::MAX.into()),
            Value::Integer(i64::MIN.into()),
            Value::Float(0.5),
            Value::Float(-1234.25),
            Value::Text(String::new()),
            Value::Text("warp".into()),
            Value::Bytes(vec![0, 1, 2, 255]),
            Value::Array(vec![Value::Bool(true), Value::Null]),
        ] {
            assert_eq!(roundtrip(&v), v, "value {v:?} failed to round-trip");
        }
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode(&Value::Bool(true)).unwrap();
        bytes.push(0x00);
        assert_eq!(decode(&bytes), Err(DecodeError::TrailingBytes));
    }

    #[test]
    fn truncation_rejected_at_every_boundary() {
        let v = Value::Map(vec![(
            Value::Text("payload".into()),
            Value::Bytes(vec![7; 40]),
        )]);
        let bytes = encode(&v).unwrap();
        for cut in 0..bytes.len() {
            assert!(
                decode(&bytes[..cut]).is_err(),
                "truncation at byte {cut} must not decode"
            );
        }
    }

    #[test]
    fn over_wide_integer_rejected() {
        // 7 encoded with one-byte argument (0x18 0x07) instead of immediate.
        assert_eq!(decode(&[0x18, 0x07]), Err(DecodeError::NonMinimalInt));
    }

    #[test]
    fn indefinite_array_rejected() {
        assert_eq!(decode(&[0x9f, 0xff]), Err(DecodeError::IndefiniteLength));
    }

    #[test]
    fn unsorted_map_rejected() {
        // {"b": 0, "a": 0} — keys reversed.
        let bytes = [0xa2, 0x61, 0x62, 0x00, 0x61, 0x61, 0x00];
        assert_eq!(decode(&bytes), Err(DecodeError::MapKeyOrder));
    }
}
