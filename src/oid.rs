//! Object Identifier: parsed sub-identifier sequence plus dotted-decimal
//! text rendering.
//!
//! The wire form (base-128, big-endian, `.1.3` compacted to a single
//! `0x2B` octet) lives in [`crate::ber`]; this module only owns the
//! parsed representation and its canonical text form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CodecError;

/// Sub-identifiers are defined to be non-negative and fit in 31 bits.
pub const MAX_SUB_IDENTIFIER: u32 = 0x7FFF_FFFF;

/// A parsed SNMP object identifier, always rooted at `.1.3` (iso.org).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid {
    parts: Vec<u32>,
}

/// Serializes as its canonical dotted-decimal text, matching how a human
/// or a `serde_yaml` config file would write an OID.
impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        self.to_text().serialize(ser)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let text = String::deserialize(de)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl Oid {
    /// Build an Oid from already-validated sub-identifiers.
    pub fn from_parts(parts: Vec<u32>) -> Result<Self, CodecError> {
        if parts.len() < 2 || parts[0] != 1 || parts[1] != 3 {
            return Err(CodecError::InvalidOid(render(&parts)));
        }
        for &p in &parts {
            if p > MAX_SUB_IDENTIFIER {
                return Err(CodecError::OidComponentTooLarge(p));
            }
        }
        Ok(Oid { parts })
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// True if `self` is `base` followed by at least one more sub-identifier,
    /// i.e. `self` is strictly inside the subtree rooted at `base`.
    pub fn is_strict_descendant_of(&self, base: &Oid) -> bool {
        self.parts.len() > base.parts.len() && self.parts[..base.parts.len()] == base.parts[..]
    }

    /// Render as the canonical dotted-decimal text, including the leading dot.
    pub fn to_text(&self) -> String {
        render(&self.parts)
    }
}

fn render(parts: &[u32]) -> String {
    let mut s = String::new();
    for p in parts {
        s.push('.');
        s.push_str(&p.to_string());
    }
    s
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl FromStr for Oid {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(CodecError::InvalidOid(s.to_string()));
        }
        let mut parts = Vec::new();
        for component in trimmed.split('.') {
            let value: u32 = component
                .parse()
                .map_err(|_| CodecError::InvalidOid(s.to_string()))?;
            parts.push(value);
        }
        Oid::from_parts(parts)
    }
}

impl TryFrom<&str> for Oid {
    type Error = CodecError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leading_dot() {
        let oid: Oid = ".1.3.6.1.2.1.1.5.0".parse().unwrap();
        assert_eq!(oid.parts(), &[1, 3, 6, 1, 2, 1, 1, 5, 0]);
        assert_eq!(oid.to_text(), ".1.3.6.1.2.1.1.5.0");
    }

    #[test]
    fn parses_without_leading_dot() {
        let oid: Oid = "1.3.6.1".parse().unwrap();
        assert_eq!(oid.to_text(), ".1.3.6.1");
    }

    #[test]
    fn rejects_wrong_root() {
        assert!("1.2.3".parse::<Oid>().is_err());
        assert!(".2.3.6.1".parse::<Oid>().is_err());
    }

    #[test]
    fn rejects_oversized_subidentifier() {
        let err = Oid::from_parts(vec![1, 3, 0xFFFF_FFFF]).unwrap_err();
        assert_eq!(err, CodecError::OidComponentTooLarge(0xFFFF_FFFF));
    }

    #[test]
    fn subtree_membership() {
        let base: Oid = ".1.3.6.1.2.1.2.2.1.1".parse().unwrap();
        let child: Oid = ".1.3.6.1.2.1.2.2.1.1.1".parse().unwrap();
        let sibling: Oid = ".1.3.6.1.2.1.2.2.1.2.1".parse().unwrap();
        assert!(child.is_strict_descendant_of(&base));
        assert!(!sibling.is_strict_descendant_of(&base));
        assert!(!base.is_strict_descendant_of(&base));
    }
}
