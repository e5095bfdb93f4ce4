//! Authority and identifier flags.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

use crate::TokenError;

/// Capability bits of an authority output.
///
/// The top 16 bits are reserved for capabilities; the low 48 bits carry the
/// creation nonce. A set `CTRL` bit makes the encoded amount negative, which
/// is what marks an output as an authority.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AuthorityFlags(pub u64);

impl AuthorityFlags {
    pub const NONE: AuthorityFlags = AuthorityFlags(0);
    pub const CTRL: AuthorityFlags = AuthorityFlags(1 << 63);
    pub const MINT: AuthorityFlags = AuthorityFlags(1 << 62);
    pub const MELT: AuthorityFlags = AuthorityFlags(1 << 61);
    pub const CCHILD: AuthorityFlags = AuthorityFlags(1 << 60);
    pub const RESCRIPT: AuthorityFlags = AuthorityFlags(1 << 59);
    pub const SUBGROUP: AuthorityFlags = AuthorityFlags(1 << 58);
    pub const CONFIGURE: AuthorityFlags = AuthorityFlags(1 << 57);

    /// Every capability bit.
    pub const ALL: AuthorityFlags = AuthorityFlags(
        Self::CTRL.0
            | Self::MINT.0
            | Self::MELT.0
            | Self::CCHILD.0
            | Self::RESCRIPT.0
            | Self::SUBGROUP.0
            | Self::CONFIGURE.0,
    );

    /// The reserved capability region.
    pub const ALL_BITS: AuthorityFlags = AuthorityFlags(0xffff << 48);

    /// True when every bit of `flag` is set.
    pub fn has_flag(self, flag: AuthorityFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// True when any bit of `flag` is set.
    pub fn intersects(self, flag: AuthorityFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn add_flag(&mut self, flag: AuthorityFlags) {
        self.0 |= flag.0;
    }

    pub fn remove_flag(&mut self, flag: AuthorityFlags) {
        self.0 &= !flag.0;
    }

    /// Low 48 bits.
    pub fn nonce(self) -> u64 {
        self.0 & !Self::ALL_BITS.0
    }

    /// Capability region with the nonce replaced.
    pub fn with_nonce(self, nonce: u64) -> AuthorityFlags {
        AuthorityFlags((self.0 & Self::ALL_BITS.0) | (nonce & !Self::ALL_BITS.0))
    }

    /// Capability region only, as carried by a renewed authority.
    pub fn renewable(self) -> AuthorityFlags {
        self & Self::ALL_BITS
    }

    pub fn is_authority(self) -> bool {
        self.has_flag(Self::CTRL)
    }

    pub fn allows_mint(self) -> bool {
        self.has_flag(Self::CTRL | Self::MINT)
    }

    pub fn allows_melt(self) -> bool {
        self.has_flag(Self::CTRL | Self::MELT)
    }

    pub fn allows_renew(self) -> bool {
        self.has_flag(Self::CTRL | Self::CCHILD)
    }

    pub fn allows_rescript(self) -> bool {
        self.has_flag(Self::CTRL | Self::RESCRIPT)
    }

    pub fn allows_subgroup(self) -> bool {
        self.has_flag(Self::CTRL | Self::SUBGROUP)
    }

    pub fn allows_configure(self) -> bool {
        self.has_flag(Self::CTRL | Self::CONFIGURE)
    }

    /// Reinterpret as the signed amount field of a grouped script.
    pub fn to_amount(self) -> i64 {
        self.0 as i64
    }

    pub fn from_amount(amount: i64) -> AuthorityFlags {
        AuthorityFlags(amount as u64)
    }

    /// Parse capability words into flags.
    ///
    /// Starts from `CTRL | CCHILD`, so every parsed authority can renew
    /// itself unless `nochild` is given.
    ///
    /// # Arguments
    /// * `words` - Any of `mint`, `melt`, `child`, `nochild`, `rescript`,
    ///   `subgroup`, `configure`, `all` (case-insensitive).
    ///
    /// # Returns
    /// The flags, or `UnknownAuthority` for an unrecognised word.
    pub fn parse_words<'a, I>(words: I) -> Result<AuthorityFlags, TokenError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut flags = Self::CTRL | Self::CCHILD;
        for word in words {
            match word.to_ascii_lowercase().as_str() {
                "mint" => flags |= Self::MINT,
                "melt" => flags |= Self::MELT,
                "child" => flags |= Self::CCHILD,
                "nochild" => flags.remove_flag(Self::CCHILD),
                "rescript" => flags |= Self::RESCRIPT,
                "subgroup" => flags |= Self::SUBGROUP,
                "configure" => flags |= Self::CONFIGURE,
                "all" => flags |= Self::ALL,
                other => return Err(TokenError::UnknownAuthority(other.to_string())),
            }
        }
        Ok(flags)
    }

    /// Capability words, space separated, in bit order.
    pub fn to_words(self) -> String {
        const NAMES: [(AuthorityFlags, &str); 7] = [
            (AuthorityFlags::CTRL, "ctrl"),
            (AuthorityFlags::MINT, "mint"),
            (AuthorityFlags::MELT, "melt"),
            (AuthorityFlags::CCHILD, "child"),
            (AuthorityFlags::RESCRIPT, "rescript"),
            (AuthorityFlags::SUBGROUP, "subgroup"),
            (AuthorityFlags::CONFIGURE, "configure"),
        ];
        NAMES
            .iter()
            .filter(|(flag, _)| self.has_flag(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for AuthorityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_words())
    }
}

impl fmt::Debug for AuthorityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorityFlags({:#018x})", self.0)
    }
}

impl BitOr for AuthorityFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        AuthorityFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for AuthorityFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for AuthorityFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        AuthorityFlags(self.0 & rhs.0)
    }
}

impl BitAndAssign for AuthorityFlags {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for AuthorityFlags {
    type Output = Self;
    fn not(self) -> Self {
        AuthorityFlags(!self.0)
    }
}

/// Identifier flags stored in byte 31 of a group id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IdFlags(pub u8);

impl IdFlags {
    pub const NONE: IdFlags = IdFlags(0);
    /// Output templates must match an input template of the group.
    pub const SAME_SCRIPT: IdFlags = IdFlags(1);
    /// Native value of the group's inputs and outputs must balance.
    pub const BALANCE_NATIVE: IdFlags = IdFlags(2);
    /// Management token.
    pub const MANAGEMENT: IdFlags = IdFlags(4);

    /// True when every bit of `flag` is set; `NONE` is always contained.
    pub fn contains(self, flag: IdFlags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl BitOr for IdFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        IdFlags(self.0 | rhs.0)
    }
}
