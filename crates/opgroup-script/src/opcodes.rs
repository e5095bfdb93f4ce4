//! Opcode constants used by token-group locking scripts and description
//! payloads.

pub const OP_0: u8 = 0x00;
pub const OP_FALSE: u8 = OP_0;
pub const OP_DATA_20: u8 = 0x14;
pub const OP_DATA_32: u8 = 0x20;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_TRUE: u8 = OP_1;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// Marks the preceding two pushes as a group identifier and amount.
///
/// Executes as a no-op; the two `OP_DROP`s that follow clear the pushes.
pub const OP_GROUP: u8 = 0xee;

/// True for opcodes that carry push data (`OP_0` excluded).
pub fn is_push_data(op: u8) -> bool {
    (0x01..=OP_PUSHDATA4).contains(&op)
}

/// True for `OP_1NEGATE` and `OP_1`..`OP_16`.
pub fn is_small_int(op: u8) -> bool {
    op == OP_1NEGATE || (OP_1..=OP_16).contains(&op)
}
