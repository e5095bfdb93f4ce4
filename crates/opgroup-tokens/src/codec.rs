//! Grouped locking-script codec.
//!
//! A grouped script is
//! `<push group id> <push amount> OP_GROUP OP_DROP OP_DROP <template>`,
//! where the template is a pay-to-key-hash or pay-to-script-hash script. A
//! negative amount is an authority; anything else is a token quantity.

use opgroup_script::chunk::read_chunk;
use opgroup_script::opcodes::{OP_DROP, OP_GROUP};
use opgroup_script::{Destination, Script, ScriptChunk};
use serde::{Deserialize, Serialize};

use crate::amount::{decode_amount, encode_amount};
use crate::flags::{AuthorityFlags, IdFlags};
use crate::group_id::{GroupId, PARENT_GROUP_ID_SIZE};

/// Economic payload of a grouped output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupPayload {
    Quantity(i64),
    Authority(AuthorityFlags),
}

impl GroupPayload {
    /// Split the signed amount field on its sign bit.
    pub fn from_amount(amount: i64) -> Self {
        if amount < 0 {
            GroupPayload::Authority(AuthorityFlags::from_amount(amount))
        } else {
            GroupPayload::Quantity(amount)
        }
    }

    pub fn to_amount(self) -> i64 {
        match self {
            GroupPayload::Quantity(q) => q,
            GroupPayload::Authority(flags) => flags.to_amount(),
        }
    }
}

/// Parsed view of one grouped output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGroupInfo {
    pub group: GroupId,
    pub payload: GroupPayload,
    /// Script suffix after the group prefix.
    pub template: Script,
}

impl TokenGroupInfo {
    pub fn is_authority(&self) -> bool {
        matches!(self.payload, GroupPayload::Authority(f) if f.is_authority())
    }

    /// Token quantity; zero for authorities.
    pub fn quantity(&self) -> i64 {
        match self.payload {
            GroupPayload::Quantity(q) => q,
            GroupPayload::Authority(_) => 0,
        }
    }

    /// Authority flags; `NONE` for quantities.
    pub fn flags(&self) -> AuthorityFlags {
        match self.payload {
            GroupPayload::Authority(f) => f,
            GroupPayload::Quantity(_) => AuthorityFlags::NONE,
        }
    }

    pub fn allows_mint(&self) -> bool {
        self.flags().allows_mint()
    }

    pub fn allows_melt(&self) -> bool {
        self.flags().allows_melt()
    }

    pub fn allows_renew(&self) -> bool {
        self.flags().allows_renew()
    }

    pub fn allows_subgroup(&self) -> bool {
        self.flags().allows_subgroup()
    }

    /// An authority with every capability and a non-zero nonce, in a group
    /// carrying `id_flags`.
    pub fn is_group_creation(&self, id_flags: IdFlags) -> bool {
        let flags = self.flags();
        self.is_authority()
            && (flags & AuthorityFlags::ALL) == AuthorityFlags::ALL
            && flags.nonce() != 0
            && self.group.has_flag(id_flags)
    }
}

/// Result of parsing a locking script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupParse {
    /// No `OP_GROUP` in the third position.
    Ungrouped,
    Grouped(TokenGroupInfo),
    /// `OP_GROUP` present but the prefix breaks the encoding rules.
    Malformed(&'static str),
}

impl GroupParse {
    pub fn grouped(&self) -> Option<&TokenGroupInfo> {
        match self {
            GroupParse::Grouped(info) => Some(info),
            _ => None,
        }
    }

    pub fn into_grouped(self) -> Option<TokenGroupInfo> {
        match self {
            GroupParse::Grouped(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, GroupParse::Malformed(_))
    }

    /// Associated group; "no group" unless grouped.
    pub fn group(&self) -> GroupId {
        self.grouped().map(|i| i.group.clone()).unwrap_or_default()
    }

    pub fn is_authority(&self) -> bool {
        self.grouped().is_some_and(TokenGroupInfo::is_authority)
    }

    pub fn quantity(&self) -> i64 {
        self.grouped().map_or(0, TokenGroupInfo::quantity)
    }

    pub fn flags(&self) -> AuthorityFlags {
        self.grouped().map_or(AuthorityFlags::NONE, TokenGroupInfo::flags)
    }
}

/// Parse the group prefix of a locking script.
///
/// # Arguments
/// * `script` - Any locking script.
///
/// # Returns
/// `Ungrouped` when the third element is not `OP_GROUP`. `Malformed` when
/// it is but the group id is shorter than 32 bytes, the amount width is not
/// 1, 2, 4 or 8, `OP_GROUP` is not followed by exactly `OP_DROP OP_DROP`, or
/// the rest is not a pay-to-key-hash or pay-to-script-hash template.
/// `Grouped` otherwise.
pub fn parse_group_script(script: &Script) -> GroupParse {
    let bytes = script.as_bytes();
    let mut pos = 0;
    let next = |pos: &mut usize| -> Option<ScriptChunk> {
        if *pos >= bytes.len() {
            return None;
        }
        read_chunk(bytes, pos).ok()
    };

    let (Some(group_chunk), Some(amount_chunk), Some(op_chunk)) =
        (next(&mut pos), next(&mut pos), next(&mut pos))
    else {
        return GroupParse::Ungrouped;
    };
    if op_chunk.op != OP_GROUP {
        return GroupParse::Ungrouped;
    }

    let group_bytes = group_chunk.data_or_empty();
    if group_bytes.len() < PARENT_GROUP_ID_SIZE {
        return GroupParse::Malformed("group id shorter than 32 bytes");
    }
    let Some(amount) = decode_amount(amount_chunk.data_or_empty()) else {
        return GroupParse::Malformed("amount is not 1, 2, 4 or 8 bytes");
    };

    if bytes.get(pos..pos + 2) != Some(&[OP_DROP, OP_DROP][..]) {
        return GroupParse::Malformed("OP_GROUP not followed by two OP_DROPs");
    }
    let template = Script::from_bytes(&bytes[pos + 2..]);
    if !template.is_p2pkh() && !template.is_p2sh() {
        return GroupParse::Malformed("template is not pay-to-key-hash or pay-to-script-hash");
    }

    GroupParse::Grouped(TokenGroupInfo {
        group: GroupId::from_bytes(group_bytes),
        payload: GroupPayload::from_amount(amount),
        template,
    })
}

/// Build a locking script paying `payload` of `group` to `destination`.
///
/// "No group" degrades to the plain template and `Destination::None` yields
/// an empty script.
pub fn build_group_script(destination: &Destination, group: &GroupId, payload: GroupPayload) -> Script {
    let template = destination.locking_script();
    if template.is_empty() || group.is_no_group() {
        return template;
    }
    let mut script = Script::new();
    let prefixed = script
        .push_data(group.as_bytes())
        .and_then(|s| s.push_data(&encode_amount(payload.to_amount())));
    if prefixed.is_err() {
        return Script::new();
    }
    script.append_raw(&[OP_GROUP, OP_DROP, OP_DROP]);
    script.append_raw(template.as_bytes());
    script
}

/// Destination of a plain or grouped script.
pub fn extract_destination(script: &Script) -> Destination {
    match parse_group_script(script) {
        GroupParse::Grouped(info) => Destination::from_script(&info.template),
        GroupParse::Ungrouped => Destination::from_script(script),
        GroupParse::Malformed(_) => Destination::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opgroup_script::opcodes::{OP_PUSHDATA1, OP_TRUE};

    fn gid(tag: u8) -> GroupId {
        GroupId::new(vec![tag; 32])
    }

    fn key_dest() -> Destination {
        Destination::KeyHash([0x42; 20])
    }

    // -----------------------------------------------------------------------
    // Round-trips
    // -----------------------------------------------------------------------

    #[test]
    fn test_quantity_roundtrip_all_destinations() {
        for dest in [key_dest(), Destination::ScriptHash([0x24; 20])] {
            let script = build_group_script(&dest, &gid(1), GroupPayload::Quantity(1000));
            let info = parse_group_script(&script).into_grouped().expect("grouped");
            assert_eq!(info.group, gid(1));
            assert_eq!(info.payload, GroupPayload::Quantity(1000));
            assert_eq!(info.template, dest.locking_script());
            assert_eq!(extract_destination(&script), dest);
        }
    }

    #[test]
    fn test_authority_roundtrip() {
        let flags = AuthorityFlags::ALL.with_nonce(77);
        let script = build_group_script(&key_dest(), &gid(2), GroupPayload::Authority(flags));
        let parsed = parse_group_script(&script);
        assert!(parsed.is_authority());
        assert_eq!(parsed.flags(), flags);
        assert_eq!(parsed.quantity(), 0);
        assert!(parsed.grouped().expect("grouped").is_group_creation(IdFlags::NONE));
    }

    #[test]
    fn test_no_group_and_none_destination() {
        let plain = build_group_script(&key_dest(), &GroupId::no_group(), GroupPayload::Quantity(5));
        assert!(plain.is_p2pkh());
        assert_eq!(parse_group_script(&plain), GroupParse::Ungrouped);
        let empty = build_group_script(&Destination::None, &gid(1), GroupPayload::Quantity(5));
        assert!(empty.is_empty());
    }

    /// A subgroup id longer than 75 bytes uses OP_PUSHDATA1 and still parses.
    #[test]
    fn test_long_subgroup_id() {
        let sub = gid(3).subgroup(&[7; 60]);
        let script = build_group_script(&key_dest(), &sub, GroupPayload::Quantity(9));
        assert_eq!(script.as_bytes()[0], OP_PUSHDATA1);
        assert_eq!(parse_group_script(&script).group(), sub);
    }

    // -----------------------------------------------------------------------
    // Rejections
    // -----------------------------------------------------------------------

    #[test]
    fn test_short_group_id_is_malformed() {
        let mut s = Script::new();
        s.push_data(&[1; 20]).expect("push");
        s.push_data(&[5]).expect("push");
        s.append_raw(&[OP_GROUP, OP_DROP, OP_DROP]);
        assert!(parse_group_script(&s).is_malformed());
    }

    #[test]
    fn test_bad_amount_width_is_malformed() {
        let mut s = Script::new();
        s.push_data(&[1; 32]).expect("push");
        s.push_data(&[5, 0, 0]).expect("push");
        s.append_raw(&[OP_GROUP, OP_DROP, OP_DROP]);
        assert!(parse_group_script(&s).is_malformed());
    }

    fn prefix(ops: &[u8]) -> Script {
        let mut s = Script::new();
        s.push_data(&[5; 32]).expect("push");
        s.push_data(&[7]).expect("push");
        s.append_raw(ops);
        s
    }

    #[test]
    fn test_missing_drop_is_malformed() {
        let template = key_dest().locking_script();

        let mut one_drop = prefix(&[OP_GROUP, OP_DROP]);
        one_drop.append_raw(template.as_bytes());
        assert!(parse_group_script(&one_drop).is_malformed());

        let mut no_drop = prefix(&[OP_GROUP]);
        no_drop.append_raw(template.as_bytes());
        assert!(parse_group_script(&no_drop).is_malformed());

        assert!(parse_group_script(&prefix(&[OP_GROUP, OP_DROP])).is_malformed());
    }

    /// Only pay-to-key-hash and pay-to-script-hash may follow the prefix.
    #[test]
    fn test_non_standard_template_is_malformed() {
        let anyone = prefix(&[OP_GROUP, OP_DROP, OP_DROP, OP_TRUE]);
        assert!(parse_group_script(&anyone).is_malformed());
        assert_eq!(extract_destination(&anyone), Destination::None);

        assert!(parse_group_script(&prefix(&[OP_GROUP, OP_DROP, OP_DROP])).is_malformed());

        let mut trailing = prefix(&[OP_GROUP, OP_DROP, OP_DROP]);
        trailing.append_raw(key_dest().locking_script().as_bytes());
        trailing.append_raw(&[OP_DROP]);
        assert!(parse_group_script(&trailing).is_malformed());

        let mut p2sh = prefix(&[OP_GROUP, OP_DROP, OP_DROP]);
        p2sh.append_raw(Destination::ScriptHash([9; 20]).locking_script().as_bytes());
        assert_eq!(parse_group_script(&p2sh).quantity(), 7);
    }

    #[test]
    fn test_non_group_scripts_are_ungrouped() {
        assert_eq!(parse_group_script(&Script::new()), GroupParse::Ungrouped);
        assert_eq!(parse_group_script(&key_dest().locking_script()), GroupParse::Ungrouped);
        // Truncated push in the first element.
        assert_eq!(parse_group_script(&Script::from_bytes(&[0x20, 1, 2])), GroupParse::Ungrouped);
        assert_eq!(extract_destination(&Script::from_bytes(&[0x6a])), Destination::None);
    }
}
