// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Canonical decoder: deterministic CBOR bytes → value tree.
//!
//! The decoder is deliberately stricter than plain CBOR: it accepts exactly
//! the byte sequences the canonical encoder produces. Anything else — tags,
//! indefinite lengths, over-wide arguments, unsorted maps, floats that should
//! have been integers — is rejected so that a digest over decoded-then-
//! re-encoded bytes can never drift.

use ciborium::value::{Integer, Value};
use half::f16;

use crate::DecodeError;

/// Decode a single canonical value from `bytes`.
///
/// # Errors
/// Returns [`DecodeError`] on truncated, trailing, or non-canonical input.
pub fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
    let mut reader = Reader { bytes, pos: 0 };
    let value = reader.read_value()?;
    if reader.pos != bytes.len() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(value)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], DecodeError> {
        if self.bytes.len().saturating_sub(self.pos) < n {
            return Err(DecodeError::Truncated);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_value(&mut self) -> Result<Value, DecodeError> {
        let initial = self.take(1)?[0];
        let major = initial >> 5;
        let info = initial & 0x1f;
        match major {
            0 => {
                let n = self.read_arg(info)?;
                Ok(Value::Integer(Integer::from(n)))
            }
            1 => {
                let n = self.read_arg(info)?;
                let v = i64::try_from(-1i128 - i128::from(n))
                    .map_err(|_| DecodeError::IntOutOfRange)?;
                Ok(Value::Integer(Integer::from(v)))
            }
            2 => {
                let len = self.read_arg(info)? as usize;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            3 => {
                let len = self.read_arg(info)? as usize;
                let raw = self.take(len)?;
                let text = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)?;
                Ok(Value::Text(text.to_owned()))
            }
            4 => {
                let len = self.read_arg(info)? as usize;
                let mut items = Vec::with_capacity(len.min(4096));
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
                Ok(Value::Array(items))
            }
            5 => self.read_map(info),
            6 => Err(DecodeError::TagNotCanonical),
            _ => self.read_simple(info),
        }
    }

    fn read_map(&mut self, info: u8) -> Result<Value, DecodeError> {
        let len = self.read_arg(info)? as usize;
        let mut entries = Vec::with_capacity(len.min(4096));
        let mut prev_key_span: Option<(usize, usize)> = None;
        for _ in 0..len {
            let key_start = self.pos;
            let key = self.read_value()?;
            let key_end = self.pos;
            if let Some((prev_start, prev_end)) = prev_key_span {
                let prev = &self.bytes[prev_start..prev_end];
                let cur = &self.bytes[key_start..key_end];
                match cur.cmp(prev) {
                    std::cmp::Ordering::Equal => return Err(DecodeError::DuplicateMapKey),
                    std::cmp::Ordering::Less => return Err(DecodeError::MapKeyOrder),
                    std::cmp::Ordering::Greater => {}
                }
            }
            prev_key_span = Some((key_start, key_end));
            let val = self.read_value()?;
            entries.push((key, val));
        }
        Ok(Value::Map(entries))
    }

    fn read_simple(&mut self, info: u8) -> Result<Value, DecodeError> {
        match info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            25 => {
                let raw = self.take(2)?;
                let bits = u16::from_be_bytes([raw[0], raw[1]]);
                let f = f64::from(f16::from_bits(bits));
                Self::reject_integral(f)?;
                Ok(Value::Float(f))
            }
            26 => {
                let raw: [u8; 4] = self
                    .take(4)?
                    .try_into()
                    .map_err(|_| DecodeError::Truncated)?;
                let f = f64::from(f32::from_be_bytes(raw));
                Self::reject_integral(f)?;
                if fits_f16(f) {
                    return Err(DecodeError::NonMinimalFloat);
                }
                Ok(Value::Float(f))
            }
            27 => {
                let raw: [u8; 8] = self
                    .take(8)?
                    .try_into()
                    .map_err(|_| DecodeError::Truncated)?;
                let f = f64::from_be_bytes(raw);
                Self::reject_integral(f)?;
                if fits_f16(f) || fits_f32(f) {
                    return Err(DecodeError::NonMinimalFloat);
                }
                Ok(Value::Float(f))
            }
            31 => Err(DecodeError::IndefiniteLength),
            other => Err(DecodeError::Malformed(format!(
                "unsupported simple value {other}"
            ))),
        }
    }

    /// Reads a header argument and enforces minimal-width encoding.
    fn read_arg(&mut self, info: u8) -> Result<u64, DecodeError> {
        let (n, width) = match info {
            0..=23 => (u64::from(info), 0usize),
            24 => (u64::from(self.take(1)?[0]), 1),
            25 => {
                let raw = self.take(2)?;
                (u64::from(u16::from_be_bytes([raw[0], raw[1]])), 2)
            }
            26 => {
                let raw: [u8; 4] = self
                    .take(4)?
                    .try_into()
                    .map_err(|_| DecodeError::Truncated)?;
                (u64::from(u32::from_be_bytes(raw)), 4)
            }
            27 => {
                let raw: [u8; 8] = self
                    .take(8)?
                    .try_into()
                    .map_err(|_| DecodeError::Truncated)?;
                (u64::from_be_bytes(raw), 8)
            }
            31 => return Err(DecodeError::IndefiniteLength),
            other => {
                return Err(DecodeError::Malformed(format!(
                    "reserved additional-info value {other}"
                )))
            }
        };
        let minimal = match n {
            0..=23 => 0,
            24..=0xff => 1,
            0x100..=0xffff => 2,
            0x1_0000..=0xffff_ffff => 4,
            _ => 8,
        };
        if width > minimal {
            return Err(DecodeError::NonMinimalInt);
        }
        Ok(n)
    }

    fn reject_integral(f: f64) -> Result<(), DecodeError> {
        if f.is_nan() || f.is_infinite() || f.fract() != 0.0 {
            return Ok(());
        }
        let i = f as i128;
        if i as f64 == f {
            return Err(DecodeError::IntegralFloat);
        }
        Ok(())
    }
}

fn fits_f16(f: f64) -> bool {
    if f.is_nan() {
        return true;
    }
    f64::from(f16::from_f64(f)) == f
}

fn fits_f32(f: f64) -> bool {
    if f.is_nan() {
        return true;
    }
    f64::from(f as f32) == f
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn immediate_integers_decode() {
        assert_eq!(decode(&[0x00]).unwrap(), Value::Integer(0.into()));
        assert_eq!(decode(&[0x17]).unwrap(), Value::Integer(23.into()));
        assert_eq!(decode(&[0x20]).unwrap(), Value::Integer((-1i64).into()));
    }

    #[test]
    fn over_wide_length_rejected() {
        // Text of length 2 with a one-byte length argument.
        assert_eq!(
            decode(&[0x78, 0x02, b'h', b'i']),
            Err(DecodeError::NonMinimalInt)
        );
    }

    #[test]
    fn float_that_fits_half_must_use_half() {
        // 0.5 as f32 (0xfa 3f000000) is valid CBOR but not canonical.
        assert_eq!(
            decode(&[0xfa, 0x3f, 0x00, 0x00, 0x00]),
            Err(DecodeError::NonMinimalFloat)
        );
    }

    #[test]
    fn integral_float_rejected() {
        // 1.0 as half-precision float.
        assert_eq!(decode(&[0xf9, 0x3c, 0x00]), Err(DecodeError::IntegralFloat));
    }

    #[test]
    fn duplicate_map_key_rejected() {
        // {"a": 0, "a": 1}
        let bytes = [0xa2, 0x61, 0x61, 0x00, 0x61, 0x61, 0x01];
        assert_eq!(decode(&bytes), Err(DecodeError::DuplicateMapKey));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let bytes = [0x62, 0xff, 0xfe];
        assert_eq!(decode(&bytes), Err(DecodeError::InvalidUtf8));
    }
}
