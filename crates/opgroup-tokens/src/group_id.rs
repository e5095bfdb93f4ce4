//! Group identifiers.
//!
//! A group identifier is an opaque byte string. Empty means "no group" (the
//! native asset). 32 bytes or more is a user group, and anything longer than
//! 32 bytes is a subgroup whose first 32 bytes are the parent. Byte 31 of a
//! user group carries its [`IdFlags`].

use std::fmt;
use std::str::FromStr;

use opgroup_primitives::hash::Hash256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::flags::IdFlags;
use crate::TokenError;

/// Length of a parent (non-subgroup) identifier.
pub const PARENT_GROUP_ID_SIZE: usize = 32;

/// Index of the identifier-flags byte.
pub const ID_FLAGS_INDEX: usize = 31;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GroupId(Vec<u8>);

impl GroupId {
    /// The native asset.
    pub fn no_group() -> Self {
        GroupId(Vec::new())
    }

    pub fn new(bytes: Vec<u8>) -> Self {
        GroupId(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        GroupId(bytes.to_vec())
    }

    /// A fresh parent identifier from a derivation hash.
    pub fn from_hash(hash: &Hash256) -> Self {
        GroupId(hash.as_bytes().to_vec())
    }

    /// Reserved single-byte identifier. Neither "no group" nor a user group;
    /// never valid in a grouped script.
    pub fn special(byte: u8) -> Self {
        GroupId(vec![byte])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_no_group(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_special(&self) -> bool {
        self.0.len() == 1
    }

    pub fn is_user_group(&self) -> bool {
        self.0.len() >= PARENT_GROUP_ID_SIZE
    }

    pub fn is_subgroup(&self) -> bool {
        self.0.len() > PARENT_GROUP_ID_SIZE
    }

    /// The parent of a subgroup, or a copy of `self` otherwise.
    pub fn parent_group(&self) -> GroupId {
        if self.is_subgroup() {
            GroupId(self.0[..PARENT_GROUP_ID_SIZE].to_vec())
        } else {
            self.clone()
        }
    }

    /// Subgroup data after the parent prefix; empty for non-subgroups.
    pub fn subgroup_data(&self) -> &[u8] {
        if self.is_subgroup() {
            &self.0[PARENT_GROUP_ID_SIZE..]
        } else {
            &[]
        }
    }

    /// Extend this identifier's parent with `postfix`.
    pub fn subgroup(&self, postfix: &[u8]) -> GroupId {
        let mut bytes = self.parent_group().0;
        bytes.extend_from_slice(postfix);
        GroupId(bytes)
    }

    /// Identifier flags from byte 31; `NONE` for non-user groups.
    pub fn id_flags(&self) -> IdFlags {
        if self.is_user_group() {
            IdFlags(self.0[ID_FLAGS_INDEX])
        } else {
            IdFlags::NONE
        }
    }

    pub fn has_flag(&self, flag: IdFlags) -> bool {
        self.id_flags().contains(flag)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, TokenError> {
        hex::decode(s)
            .map(GroupId)
            .map_err(|e| TokenError::InvalidGroupId(format!("'{}': {}", s, e)))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_no_group() {
            f.write_str("none")
        } else {
            f.write_str(&self.to_hex())
        }
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self)
    }
}

impl FromStr for GroupId {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "none" {
            return Ok(GroupId::no_group());
        }
        GroupId::from_hex(s)
    }
}

impl Serialize for GroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for GroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        GroupId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(flags: u8) -> GroupId {
        let mut bytes = vec![0x5a; PARENT_GROUP_ID_SIZE];
        bytes[ID_FLAGS_INDEX] = flags;
        GroupId::new(bytes)
    }

    #[test]
    fn test_classification() {
        assert!(GroupId::no_group().is_no_group());
        assert!(!GroupId::no_group().is_user_group());
        assert!(GroupId::special(0).is_special());
        assert!(!GroupId::special(0).is_user_group());
        let p = parent(0);
        assert!(p.is_user_group());
        assert!(!p.is_subgroup());
        let sub = p.subgroup(b"gold");
        assert!(sub.is_subgroup());
        assert_eq!(sub.len(), 36);
        assert_eq!(sub.subgroup_data(), b"gold");
        assert_eq!(sub.parent_group(), p);
    }

    /// Subgroups of subgroups hang off the same 32-byte parent.
    #[test]
    fn test_subgroup_of_subgroup_uses_parent() {
        let p = parent(0);
        let nested = p.subgroup(b"a").subgroup(b"b");
        assert_eq!(nested.as_bytes().len(), 33);
        assert_eq!(nested.parent_group(), p);
    }

    #[test]
    fn test_id_flags_inherited_by_subgroup() {
        let p = parent(IdFlags::MANAGEMENT.0 | IdFlags::SAME_SCRIPT.0);
        assert!(p.has_flag(IdFlags::MANAGEMENT));
        assert!(p.has_flag(IdFlags::SAME_SCRIPT));
        assert!(!p.has_flag(IdFlags::BALANCE_NATIVE));
        assert!(p.subgroup(&[1, 2]).has_flag(IdFlags::MANAGEMENT));
        assert_eq!(GroupId::no_group().id_flags(), IdFlags::NONE);
    }

    #[test]
    fn test_text_roundtrip() {
        let sub = parent(2).subgroup(&[9, 9]);
        let text = sub.to_string();
        assert_eq!(text.parse::<GroupId>().expect("parse"), sub);
        assert_eq!("none".parse::<GroupId>().expect("none"), GroupId::no_group());
        assert!("xyz".parse::<GroupId>().is_err());
    }
}
