// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Canonical encoder: value tree → deterministic CBOR bytes.

use ciborium::value::Value;
use half::f16;

use crate::EncodeError;

/// Encode `value` into canonical CBOR bytes.
///
/// # Errors
/// Returns [`EncodeError`] for tags, duplicate map keys, or values with no
/// canonical representation. On error nothing is emitted.
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    match value {
        Value::Null => out.push(0xf6),
        Value::Bool(true) => out.push(0xf5),
        Value::Bool(false) => out.push(0xf4),
        Value::Integer(n) => write_int(i128::from(*n), out),
        Value::Float(f) => write_float(*f, out),
        Value::Text(s) => {
            write_header(3, s.len() as u64, out);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            write_header(2, b.len() as u64, out);
            out.extend_from_slice(b);
        }
        Value::Array(items) => {
            write_header(4, items.len() as u64, out);
            for item in items {
                write_value(item, out)?;
            }
        }
        Value::Map(entries) => write_map(entries, out)?,
        Value::Tag(_, _) => return Err(EncodeError::TagNotCanonical),
        other => return Err(EncodeError::Unrepresentable(format!("{other:?}"))),
    }
    Ok(())
}

/// Maps sort by the encoded bytes of their keys, not by `Value` comparison:
/// bytewise key order is the only order both sides can agree on without a
/// shared collation.
fn write_map(entries: &[(Value, Value)], out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let mut encoded: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (key, val) in entries {
        let mut key_bytes = Vec::new();
        write_value(key, &mut key_bytes)?;
        encoded.push((key_bytes, val));
    }
    encoded.sort_by(|a, b| a.0.cmp(&b.0));
    if encoded.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(EncodeError::DuplicateMapKey);
    }
    write_header(5, encoded.len() as u64, out);
    for (key_bytes, val) in encoded {
        out.extend_from_slice(&key_bytes);
        write_value(val, out)?;
    }
    Ok(())
}

fn write_int(n: i128, out: &mut Vec<u8>) {
    if n >= 0 {
        write_header(0, n as u64, out);
    } else {
        write_header(1, (-1 - n) as u64, out);
    }
}

/// Floats shrink to the narrowest width that round-trips; integral values
/// leave the float lane entirely.
fn write_float(f: f64, out: &mut Vec<u8>) {
    if f.is_nan() || f.is_infinite() {
        out.push(0xf9);
        out.extend_from_slice(&f16::from_f64(f).to_bits().to_be_bytes());
        return;
    }
    if f.fract() == 0.0 {
        const I128_MAX_F: f64 = i128::MAX as f64;
        const I128_MIN_F: f64 = i128::MIN as f64;
        if (I128_MIN_F..=I128_MAX_F).contains(&f) {
            let i = f as i128;
            if i as f64 == f {
                write_int(i, out);
                return;
            }
        }
    }
    let half_width = f16::from_f64(f);
    if f64::from(half_width) == f {
        out.push(0xf9);
        out.extend_from_slice(&half_width.to_bits().to_be_bytes());
        return;
    }
    let single = f as f32;
    if f64::from(single) == f {
        out.push(0xfa);
        out.extend_from_slice(&single.to_be_bytes());
    } else {
        out.push(0xfb);
        out.extend_from_slice(&f.to_be_bytes());
    }
}

/// Writes a major-type header with the minimal-width argument encoding.
fn write_header(major: u8, arg: u64, out: &mut Vec<u8>) {
    debug_assert!(major <= 5);
    match arg {
        0..=23 => out.push((major << 5) | arg as u8),
        24..=0xff => {
            out.push((major << 5) | 24);
            out.push(arg as u8);
        }
        0x100..=0xffff => {
            out.push((major << 5) | 25);
            out.extend_from_slice(&(arg as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push((major << 5) | 26);
            out.extend_from_slice(&(arg as u32).to_be_bytes());
        }
        _ => {
            out.push((major << 5) | 27);
            out.extend_from_slice(&arg.to_be_bytes());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn header_widths_are_minimal() {
        let mut out = Vec::new();
        write_header(0, 23, &mut out);
        assert_eq!(out, [0x17]);
        out.clear();
        write_header(0, 24, &mut out);
        assert_eq!(out, [0x18, 0x18]);
        out.clear();
        write_header(0, 256, &mut out);
        assert_eq!(out, [0x19, 0x01, 0x00]);
        out.clear();
        write_header(0, 65536, &mut out);
        assert_eq!(out, [0x1a, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn negative_integers_use_major_one() {
        assert_eq!(encode(&Value::Integer((-1i64).into())).unwrap(), [0x20]);
        assert_eq!(
            encode(&Value::Integer((-25i64).into())).unwrap(),
            [0x38, 0x18]
        );
    }

    #[test]
    fn half_precision_float_when_exact() {
        // 0.5 is exactly representable in f16.
        assert_eq!(
            encode(&Value::Float(0.5)).unwrap(),
            [0xf9, 0x38, 0x00],
            "0.5 must encode as half-precision"
        );
    }
}
