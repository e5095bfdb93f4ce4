//! Transaction outputs.

use opgroup_primitives::util::{ByteReader, ByteWriter};
use opgroup_script::Script;
use serde::{Deserialize, Serialize};

use crate::TransactionError;

/// A value paid to a locking script.
///
/// | Field         | Size                |
/// |---------------|---------------------|
/// | value         | 8 bytes (LE)        |
/// | script_pubkey | CompactSize + bytes |
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Native value in base units.
    pub value: u64,
    pub script_pubkey: Script,
}

impl TransactionOutput {
    pub fn new(value: u64, script_pubkey: Script) -> Self {
        TransactionOutput { value, script_pubkey }
    }

    /// True for the value-0, empty-script marker output of a coinstake.
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }

    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let value = reader.read_u64_le()?;
        let script = reader.read_var_bytes().map_err(|e| {
            TransactionError::SerializationError(format!("reading script_pubkey: {}", e))
        })?;
        Ok(TransactionOutput { value, script_pubkey: Script::from_bytes(script) })
    }

    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_u64_le(self.value);
        writer.write_var_bytes(self.script_pubkey.as_bytes());
    }

    /// Serialized size in bytes.
    pub fn serialized_size(&self) -> usize {
        let mut w = ByteWriter::new();
        self.write_to(&mut w);
        w.len()
    }
}
