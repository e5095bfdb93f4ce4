//! Script chunk parsing and push encoding.
//!
//! A chunk is one opcode plus, for push opcodes, the bytes it pushes.
//! Unlike a general disassembler, `OP_RETURN` is an ordinary chunk here so
//! that the pushes of a description payload after it stay addressable.

use crate::opcodes::*;
use crate::ScriptError;

/// A single parsed element of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte. For direct pushes (1-75 bytes) this is the length.
    pub op: u8,
    /// The pushed bytes, if this chunk is a push operation.
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// Pushed bytes, or an empty slice for `OP_0` and non-push opcodes.
    pub fn data_or_empty(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// True when this chunk pushes data (including `OP_0`, the empty push).
    pub fn is_push(&self) -> bool {
        self.op == OP_0 || self.data.is_some()
    }
}

/// Read one chunk starting at `*pos`, advancing `*pos` past it.
///
/// # Arguments
/// * `bytes` - Whole script.
/// * `pos` - Cursor; must be `< bytes.len()`.
///
/// # Returns
/// The chunk, or `DataTooSmall` when a push runs off the end.
pub fn read_chunk(bytes: &[u8], pos: &mut usize) -> Result<ScriptChunk, ScriptError> {
    let start = *pos;
    let op = bytes[start];
    let (header, len) = match op {
        0x01..=0x4b => (1, op as usize),
        OP_PUSHDATA1 => {
            let b = bytes.get(start + 1).ok_or(ScriptError::DataTooSmall(start))?;
            (2, *b as usize)
        }
        OP_PUSHDATA2 => {
            let b = bytes
                .get(start + 1..start + 3)
                .ok_or(ScriptError::DataTooSmall(start))?;
            (3, u16::from_le_bytes([b[0], b[1]]) as usize)
        }
        OP_PUSHDATA4 => {
            let b = bytes
                .get(start + 1..start + 5)
                .ok_or(ScriptError::DataTooSmall(start))?;
            (5, u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
        }
        _ => {
            *pos += 1;
            return Ok(ScriptChunk { op, data: None });
        }
    };
    let data = bytes
        .get(start + header..start + header + len)
        .ok_or(ScriptError::DataTooSmall(start))?
        .to_vec();
    *pos = start + header + len;
    Ok(ScriptChunk { op, data: Some(data) })
}

/// Decode raw script bytes into chunks.
///
/// # Arguments
/// * `bytes` - The raw script bytes to decode.
///
/// # Returns
/// All chunks in order, or a `ScriptError` if a push is truncated.
pub fn decode_script(bytes: &[u8]) -> Result<Vec<ScriptChunk>, ScriptError> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        chunks.push(read_chunk(bytes, &mut pos)?);
    }
    Ok(chunks)
}

/// Compute the push prefix for a payload of `data_len` bytes.
///
/// Uses the smallest push form. An empty payload is pushed as `OP_0`.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    if data_len <= 75 {
        Ok(vec![data_len as u8])
    } else if data_len <= 0xff {
        Ok(vec![OP_PUSHDATA1, data_len as u8])
    } else if data_len <= 0xffff {
        let mut buf = vec![OP_PUSHDATA2];
        buf.extend_from_slice(&(data_len as u16).to_le_bytes());
        Ok(buf)
    } else if data_len <= 0xffff_ffff {
        let mut buf = vec![OP_PUSHDATA4];
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        Ok(buf)
    } else {
        Err(ScriptError::DataTooBig(data_len))
    }
}
