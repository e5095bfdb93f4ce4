//! Amount field encoding and fixed-point display conversion.
//!
//! The amount push of a grouped script has no length prefix of its own: the
//! push length (1, 2, 4 or 8) is the encoding width. Negative values, which
//! are authority flags, always take 8 bytes.

use crate::TokenError;

/// Largest token quantity accepted from user input.
pub const MAX_TOKEN_AMOUNT: i64 = 922_337_203_685_477_580;

/// Largest decimal position a description may carry.
pub const MAX_DECIMAL_POS: u8 = 16;

/// Serialize an amount in the smallest width among 1, 2, 4 and 8 bytes,
/// little-endian.
pub fn encode_amount(amount: i64) -> Vec<u8> {
    if amount < 0 {
        amount.to_le_bytes().to_vec()
    } else if amount <= u8::MAX as i64 {
        vec![amount as u8]
    } else if amount <= u16::MAX as i64 {
        (amount as u16).to_le_bytes().to_vec()
    } else if amount <= u32::MAX as i64 {
        (amount as u32).to_le_bytes().to_vec()
    } else {
        amount.to_le_bytes().to_vec()
    }
}

/// Deserialize an amount using the slice length as its width.
///
/// # Returns
/// The amount, or `None` for a width other than 1, 2, 4 or 8.
pub fn decode_amount(bytes: &[u8]) -> Option<i64> {
    match bytes.len() {
        1 => Some(bytes[0] as i64),
        2 => Some(u16::from_le_bytes([bytes[0], bytes[1]]) as i64),
        4 => Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64),
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            Some(i64::from_le_bytes(buf))
        }
        _ => None,
    }
}

/// True for quantities a user may request.
pub fn token_money_range(amount: i64) -> bool {
    (0..=MAX_TOKEN_AMOUNT).contains(&amount)
}

/// `10^decimal_pos` as an unsigned value.
pub fn coin_unit(decimal_pos: u8) -> u64 {
    10u64.saturating_pow(decimal_pos as u32)
}

/// Parse a fixed-point display value into raw units.
///
/// Digits past `decimal_pos` are accepted only when they are zero. A leading
/// `-` is allowed; the magnitude must not exceed [`MAX_TOKEN_AMOUNT`].
///
/// # Arguments
/// * `value` - Display string such as `"5.00"` or `"-0.5"`.
/// * `decimal_pos` - The group's decimal position.
///
/// # Returns
/// The raw amount, `InvalidAmount` for a malformed string, or
/// `AmountOutOfRange`.
pub fn amount_from_display_value(value: &str, decimal_pos: u8) -> Result<i64, TokenError> {
    let invalid = || TokenError::InvalidAmount(value.to_string());
    let trimmed = value.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) if !f.is_empty() => (i, f),
        Some(_) => return Err(invalid()),
        None => (digits, ""),
    };
    if int_part.is_empty()
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let places = decimal_pos as usize;
    let (kept, dropped) = frac_part.split_at(frac_part.len().min(places));
    if dropped.bytes().any(|b| b != b'0') {
        return Err(invalid());
    }

    let out_of_range = || TokenError::AmountOutOfRange(if negative { i64::MIN } else { i64::MAX });
    let mut magnitude: i64 = 0;
    let padded = kept.bytes().chain(std::iter::repeat(b'0').take(places - kept.len()));
    for b in int_part.bytes().chain(padded) {
        magnitude = magnitude
            .checked_mul(10)
            .and_then(|m| m.checked_add((b - b'0') as i64))
            .ok_or_else(out_of_range)?;
    }
    if magnitude > MAX_TOKEN_AMOUNT {
        return Err(TokenError::AmountOutOfRange(if negative { -magnitude } else { magnitude }));
    }
    Ok(if negative { -magnitude } else { magnitude })
}

/// Format raw units as a fixed-point display value.
///
/// A decimal position of 0 prints the integer only; otherwise the fraction
/// is zero-padded to `decimal_pos` digits.
pub fn display_value_from_amount(amount: i64, decimal_pos: u8) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let coin = coin_unit(decimal_pos);
    let quotient = abs / coin;
    let remainder = abs % coin;
    if decimal_pos == 0 {
        format!("{}{}", sign, quotient)
    } else {
        format!("{}{}.{:0width$}", sign, quotient, remainder, width = decimal_pos as usize)
    }
}
