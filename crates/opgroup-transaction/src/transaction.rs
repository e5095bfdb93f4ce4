//! Core transaction type.
//!
//! Represents a complete transaction with version, inputs, outputs and lock
//! time. Supports binary and hex serialization, txid computation, and the
//! coinbase/coinstake checks the token-group validator skips on.

use opgroup_primitives::hash::Hash256;
use opgroup_primitives::util::{ByteReader, ByteWriter};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::input::{OutPoint, TransactionInput};
use crate::output::TransactionOutput;
use crate::TransactionError;

/// A transaction consisting of a version, inputs, outputs, and a lock time.
///
/// # Wire format
///
/// | Field        | Size                  |
/// |--------------|-----------------------|
/// | version      | 4 bytes (LE)          |
/// | input count  | CompactSize           |
/// | inputs       | variable (per input)  |
/// | output count | CompactSize           |
/// | outputs      | variable (per output) |
/// | lock_time    | 4 bytes (LE)          |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    /// Create a new empty transaction with version 1 and lock time 0.
    pub fn new() -> Self {
        Transaction {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    // -----------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------

    /// Parse a transaction from a hex-encoded string.
    ///
    /// # Arguments
    /// * `hex_str` - A hex string of the raw transaction bytes.
    ///
    /// # Returns
    /// The transaction, or a `TransactionError` if the hex is invalid or the
    /// bytes do not form a transaction.
    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| TransactionError::SerializationError(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a transaction from raw bytes. Trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = ByteReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if reader.remaining() > 0 {
            return Err(TransactionError::TrailingBytes(reader.remaining()));
        }
        Ok(tx)
    }

    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let version = reader.read_u32_le()?;
        let input_count = reader.read_compact_size()?;
        let mut inputs = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            inputs.push(TransactionInput::read_from(reader)?);
        }
        let output_count = reader.read_compact_size()?;
        let mut outputs = Vec::with_capacity(output_count.min(1024) as usize);
        for _ in 0..output_count {
            outputs.push(TransactionOutput::read_from(reader)?);
        }
        let lock_time = reader.read_u32_le()?;
        Ok(Transaction { version, inputs, outputs, lock_time })
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_u32_le(self.version);
        writer.write_compact_size(self.inputs.len() as u64);
        for input in &self.inputs {
            input.write_to(writer);
        }
        writer.write_compact_size(self.outputs.len() as u64);
        for output in &self.outputs {
            output.write_to(writer);
        }
        writer.write_u32_le(self.lock_time);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(256);
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Serialized size in bytes.
    pub fn serialized_size(&self) -> usize {
        self.to_bytes().len()
    }

    /// SHA-256d of the serialized transaction.
    pub fn txid(&self) -> Hash256 {
        Hash256::digest(&self.to_bytes())
    }

    // -----------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------

    /// A single input spending the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    /// A staking transaction: spends a real outpoint and leads its outputs
    /// with an empty marker output.
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].prevout.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    // -----------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------

    /// Append an unsigned input spending `prevout`.
    pub fn add_input(&mut self, prevout: OutPoint) -> &mut TransactionInput {
        self.inputs.push(TransactionInput::new(prevout));
        let last = self.inputs.len() - 1;
        &mut self.inputs[last]
    }

    pub fn add_output(&mut self, output: TransactionOutput) {
        self.outputs.push(output);
    }

    /// Sum of output values, or `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Transaction::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
