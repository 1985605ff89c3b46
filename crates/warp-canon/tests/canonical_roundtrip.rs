// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Property tests for the canonical codec.
//!
//! Two laws:
//! 1. decode ∘ encode is the identity for values already in canonical form
//!    (no integral floats, no NaN).
//! 2. encode ∘ decode ∘ encode == encode — the canonical bytes are a fixed
//!    point, whatever value shape went in.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use warp_canon::{decode, encode, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Integer(n.into())),
        any::<u64>().prop_map(|n| Value::Integer(n.into())),
        ".{0,24}".prop_map(Value::Text),
        vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ]
}

fn value_tree() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..6).prop_map(Value::Array),
            btree_map(".{0,12}", inner, 0..6).prop_map(|m| {
                Value::Map(
                    m.into_iter()
                        .map(|(k, v)| (Value::Text(k), v))
                        .collect(),
                )
            }),
        ]
    })
}

proptest! {
    #[test]
    fn decode_inverts_encode(v in value_tree()) {
        let bytes = encode(&v).unwrap();
        let back = decode(&bytes).unwrap();
        prop_assert_eq!(back, v);
    }

    #[test]
    fn canonical_bytes_are_a_fixed_point(v in value_tree()) {
        let first = encode(&v).unwrap();
        let second = encode(&decode(&first).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn floats_reach_a_fixed_point(f in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
        let first = encode(&Value::Float(f)).unwrap();
        let second = encode(&decode(&first).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in vec(any::<u8>(), 0..128)) {
        let _ = decode(&bytes);
    }
}
