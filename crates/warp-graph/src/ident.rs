// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Writer and graph identifiers.
//!
//! A [`WriterId`] names one writer within one graph and doubles as a ref
//! path segment, so both accepted forms are ref-safe by construction:
//!
//! - *Canonical*: `w_` followed by 26 lowercase Crockford base-32 characters
//!   (exactly 28 chars), derived from 16 CSPRNG bytes. Collision probability
//!   across a million writers is cryptographically negligible.
//! - *User-supplied*: `[A-Za-z0-9._-]+`, at most 64 characters, no `..`
//!   substring, no leading `.`.
//!
//! Once a writer id is chosen for a `(graph, local identity)` pair it is
//! persisted and never changes (see the `config` module).

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::WarpError;

/// Crockford base-32 alphabet, lowercase: `0-9` then `a-z` minus `i l o u`.
const CROCKFORD: &[u8; 32] = b"0123456789abcdefghjkmnpqrstvwxyz";

const CANONICAL_PREFIX: &str = "w_";
const CANONICAL_LEN: usize = 28;
const USER_MAX_LEN: usize = 64;

/// Opaque identifier of a writer within a graph.
///
/// Total order is plain byte order on the id string; the reducer uses it as
/// the middle component of the event-id tie-break, so it must never be
/// normalized or case-folded.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct WriterId(String);

impl WriterId {
    /// Generate a fresh canonical writer id from 16 CSPRNG bytes.
    pub fn generate() -> Self {
        let mut raw = [0u8; 16];
        OsRng.fill_bytes(&mut raw);
        Self::from_entropy(&raw)
    }

    /// Derive the canonical id for the given 16 entropy bytes.
    ///
    /// 128 bits encode as 26 base-32 digits (130 bits, top two bits zero).
    pub(crate) fn from_entropy(raw: &[u8; 16]) -> Self {
        let mut acc = 0u128;
        for byte in raw {
            acc = (acc << 8) | u128::from(*byte);
        }
        let mut digits = [b'0'; 26];
        for slot in digits.iter_mut().rev() {
            *slot = CROCKFORD[(acc & 0x1f) as usize];
            acc >>= 5;
        }
        let mut id = String::with_capacity(CANONICAL_LEN);
        id.push_str(CANONICAL_PREFIX);
        for digit in digits {
            id.push(char::from(digit));
        }
        Self(id)
    }

    /// Validate and wrap an id in either accepted form.
    ///
    /// # Errors
    /// [`WarpError::InvalidArgument`] when the string is neither a canonical
    /// nor a well-formed user-supplied id.
    pub fn parse(s: &str) -> Result<Self, WarpError> {
        if looks_canonical(s) {
            return Ok(Self(s.to_owned()));
        }
        validate_user_segment(s, "writer id")?;
        Ok(Self(s.to_owned()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id is in the canonical (generated) form.
    pub fn is_canonical(&self) -> bool {
        looks_canonical(&self.0)
    }
}

impl std::fmt::Display for WriterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated graph name; shares the user-supplied id grammar because it is
/// also a ref path segment.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct GraphName(String);

impl GraphName {
    /// Validate and wrap a graph name.
    ///
    /// # Errors
    /// [`WarpError::InvalidArgument`] on an unsafe or empty name.
    pub fn parse(s: &str) -> Result<Self, WarpError> {
        validate_user_segment(s, "graph name")?;
        Ok(Self(s.to_owned()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GraphName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn looks_canonical(s: &str) -> bool {
    s.len() == CANONICAL_LEN
        && s.starts_with(CANONICAL_PREFIX)
        && s.as_bytes()[CANONICAL_PREFIX.len()..]
            .iter()
            .all(|b| CROCKFORD.contains(b))
}

/// Shared grammar for user-supplied ref path segments.
fn validate_user_segment(s: &str, what: &str) -> Result<(), WarpError> {
    if s.is_empty() {
        return Err(WarpError::InvalidArgument(format!("{what} is empty")));
    }
    if s.len() > USER_MAX_LEN {
        return Err(WarpError::InvalidArgument(format!(
            "{what} exceeds {USER_MAX_LEN} characters"
        )));
    }
    if s.starts_with('.') {
        return Err(WarpError::InvalidArgument(format!(
            "{what} must not start with '.'"
        )));
    }
    if s.contains("..") {
        return Err(WarpError::InvalidArgument(format!(
            "{what} must not contain '..'"
        )));
    }
    if let Some(bad) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(WarpError::InvalidArgument(format!(
            "{what} contains disallowed character {bad:?}"
        )));
    }
    Ok(())
}
