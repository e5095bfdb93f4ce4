//! Transaction inputs and the outpoints they spend.
//!
//! Wire format of an input:
//!
//! | Field       | Size           |
//! |-------------|----------------|
//! | prev txid   | 32 bytes       |
//! | prev vout   | 4 bytes (LE)   |
//! | script_sig  | CompactSize + bytes |
//! | sequence    | 4 bytes (LE)   |

use std::fmt;

use opgroup_primitives::hash::Hash256;
use opgroup_primitives::util::{ByteReader, ByteWriter};
use opgroup_script::Script;
use serde::{Deserialize, Serialize};

use crate::TransactionError;

/// Default sequence number indicating a finalized input.
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// Reference to a specific output of a previous transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    /// Serialized width: 32-byte txid plus 4-byte index.
    pub const SIZE: usize = 36;

    pub fn new(txid: Hash256, vout: u32) -> Self {
        OutPoint { txid, vout }
    }

    /// The outpoint spent by a coinbase input.
    pub fn null() -> Self {
        OutPoint { txid: Hash256::ZERO, vout: u32::MAX }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }

    /// 36-byte wire form: txid bytes then little-endian index.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..32].copy_from_slice(self.txid.as_bytes());
        out[32..].copy_from_slice(&self.vout.to_le_bytes());
        out
    }

    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let txid = Hash256::new(reader.read_array::<32>()?);
        let vout = reader.read_u32_le()?;
        Ok(OutPoint { txid, vout })
    }

    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.to_bytes());
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A single transaction input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInput {
    /// The output being spent.
    pub prevout: OutPoint,
    /// Unlocking script; empty until the input is signed.
    pub script_sig: Script,
    pub sequence: u32,
}

impl TransactionInput {
    /// An unsigned input spending `prevout` with the final sequence number.
    pub fn new(prevout: OutPoint) -> Self {
        TransactionInput {
            prevout,
            script_sig: Script::new(),
            sequence: DEFAULT_SEQUENCE_NUMBER,
        }
    }

    /// Deserialize an input from a `ByteReader`.
    ///
    /// # Arguments
    /// * `reader` - The reader positioned at the start of an encoded input.
    ///
    /// # Returns
    /// The input, or a `TransactionError` when the data is truncated.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let prevout = OutPoint::read_from(reader)?;
        let script_sig = Script::from_bytes(reader.read_var_bytes().map_err(|e| {
            TransactionError::SerializationError(format!("reading script_sig: {}", e))
        })?);
        let sequence = reader.read_u32_le()?;
        Ok(TransactionInput { prevout, script_sig, sequence })
    }

    pub fn write_to(&self, writer: &mut ByteWriter) {
        self.prevout.write_to(writer);
        writer.write_var_bytes(self.script_sig.as_bytes());
        writer.write_u32_le(self.sequence);
    }

    /// Serialized size in bytes.
    pub fn serialized_size(&self) -> usize {
        let mut w = ByteWriter::new();
        self.write_to(&mut w);
        w.len()
    }
}
