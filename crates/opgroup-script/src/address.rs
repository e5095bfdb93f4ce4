//! Destinations and Base58Check addresses.
//!
//! A `Destination` is what a plain pay-to template pays to: a key hash or a
//! script hash. Grouped outputs carry the same destinations behind their
//! group prefix, so the token layer extracts them from the template tail.

use std::fmt;
use std::str::FromStr;

use opgroup_primitives::base58;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::opcodes::*;
use crate::{Script, ScriptError};

/// Network a Base58Check address belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Key-hash prefix 103, script-hash prefix 88.
    Mainnet,
    /// Key-hash prefix 97, script-hash prefix 12.
    Testnet,
    /// Shares the testnet prefixes.
    Regtest,
}

impl Network {
    /// Version byte for pay-to-key-hash addresses.
    pub fn key_hash_version(self) -> u8 {
        match self {
            Network::Mainnet => 103,
            Network::Testnet | Network::Regtest => 97,
        }
    }

    /// Version byte for pay-to-script-hash addresses.
    pub fn script_hash_version(self) -> u8 {
        match self {
            Network::Mainnet => 88,
            Network::Testnet | Network::Regtest => 12,
        }
    }
}

/// Where a plain output pays to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Destination {
    /// Not a recognised template.
    #[default]
    None,
    /// Pay-to-key-hash.
    KeyHash([u8; 20]),
    /// Pay-to-script-hash.
    ScriptHash([u8; 20]),
}

impl Destination {
    pub fn is_none(&self) -> bool {
        matches!(self, Destination::None)
    }

    /// Build the plain locking script for this destination.
    ///
    /// # Returns
    /// The template script, or an empty script for `Destination::None`.
    pub fn locking_script(&self) -> Script {
        let mut bytes = Vec::with_capacity(25);
        match self {
            Destination::None => {}
            Destination::KeyHash(h) => {
                bytes.extend_from_slice(&[OP_DUP, OP_HASH160, OP_DATA_20]);
                bytes.extend_from_slice(h);
                bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
            }
            Destination::ScriptHash(h) => {
                bytes.extend_from_slice(&[OP_HASH160, OP_DATA_20]);
                bytes.extend_from_slice(h);
                bytes.push(OP_EQUAL);
            }
        }
        Script::from(bytes)
    }

    /// Recognise a plain pay-to template.
    pub fn from_script(script: &Script) -> Destination {
        let b = script.as_bytes();
        let mut hash = [0u8; 20];
        if script.is_p2pkh() {
            hash.copy_from_slice(&b[3..23]);
            Destination::KeyHash(hash)
        } else if script.is_p2sh() {
            hash.copy_from_slice(&b[2..22]);
            Destination::ScriptHash(hash)
        } else {
            Destination::None
        }
    }
}

/// A Base58Check address: a destination bound to a network.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    pub destination: Destination,
    pub network: Network,
}

impl Address {
    pub fn new(destination: Destination, network: Network) -> Self {
        Address { destination, network }
    }

    /// Parse an address and require that it belongs to `network`.
    ///
    /// # Arguments
    /// * `addr` - The Base58Check address string.
    /// * `network` - Network whose version bytes are accepted.
    ///
    /// # Returns
    /// The address, or `WrongNetwork` when the version byte is foreign.
    pub fn from_string_for(addr: &str, network: Network) -> Result<Self, ScriptError> {
        let (version, payload) = decode_payload(addr)?;
        let destination = if version == network.key_hash_version() {
            Destination::KeyHash(payload)
        } else if version == network.script_hash_version() {
            Destination::ScriptHash(payload)
        } else {
            return Err(ScriptError::WrongNetwork { version, network });
        };
        Ok(Address { destination, network })
    }

    /// Locking script paying to this address.
    pub fn locking_script(&self) -> Script {
        self.destination.locking_script()
    }
}

fn decode_payload(addr: &str) -> Result<(u8, [u8; 20]), ScriptError> {
    let (version, payload) = base58::check_decode(addr)?;
    let hash: [u8; 20] = payload.as_slice().try_into().map_err(|_| {
        ScriptError::InvalidAddress(format!("'{}' has a {}-byte payload", addr, payload.len()))
    })?;
    Ok((version, hash))
}

impl FromStr for Address {
    type Err = ScriptError;

    /// Detect the network from the version byte. Regtest addresses parse as
    /// testnet since the two share prefixes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (version, _) = decode_payload(s)?;
        for network in [Network::Mainnet, Network::Testnet] {
            if version == network.key_hash_version() || version == network.script_hash_version() {
                return Address::from_string_for(s, network);
            }
        }
        Err(ScriptError::InvalidAddress(format!(
            "unknown version byte {} in '{}'",
            version, s
        )))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = match &self.destination {
            Destination::None => return Ok(()),
            Destination::KeyHash(h) => base58::check_encode(self.network.key_hash_version(), h),
            Destination::ScriptHash(h) => {
                base58::check_encode(self.network.script_hash_version(), h)
            }
        };
        f.write_str(&encoded)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
