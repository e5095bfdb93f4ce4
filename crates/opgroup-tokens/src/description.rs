//! Token descriptions and their OP_RETURN payload.
//!
//! Payload layout:
//! `OP_RETURN <marker 88888888> <ticker> <name> <decimal> <url> <hash>`.
//! Fields are positional; a missing or empty decimal means 8.

use opgroup_primitives::hash::Hash256;
use opgroup_script::opcodes::OP_RETURN;
use opgroup_script::Script;
use serde::{Deserialize, Serialize};

use crate::amount::{coin_unit, decode_amount, encode_amount, MAX_DECIMAL_POS};
use crate::TokenError;

/// Script number pushed right after `OP_RETURN` in a description payload.
pub const DESCRIPTION_MARKER: i64 = 88_888_888;

pub const DEFAULT_DECIMAL_POS: u8 = 8;
pub const MAX_TICKER_LEN: usize = 10;
pub const MAX_NAME_LEN: usize = 30;
pub const MAX_URL_LEN: usize = 98;

/// Metadata attached to a group at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGroupDescription {
    pub ticker: String,
    pub name: String,
    pub decimal_pos: u8,
    pub document_url: String,
    pub document_hash: Hash256,
}

impl Default for TokenGroupDescription {
    fn default() -> Self {
        TokenGroupDescription {
            ticker: String::new(),
            name: String::new(),
            decimal_pos: DEFAULT_DECIMAL_POS,
            document_url: String::new(),
            document_hash: Hash256::ZERO,
        }
    }
}

impl TokenGroupDescription {
    pub fn new(ticker: &str, name: &str, decimal_pos: u8, document_url: &str, document_hash: Hash256) -> Self {
        TokenGroupDescription {
            ticker: ticker.to_string(),
            name: name.to_string(),
            decimal_pos,
            document_url: document_url.to_string(),
            document_hash,
        }
    }

    /// Raw units per display unit.
    pub fn coin(&self) -> u64 {
        coin_unit(self.decimal_pos)
    }

    /// Read a description from an OP_RETURN payload.
    ///
    /// Anything that is not a marked description payload, including an
    /// empty script, yields the default description.
    pub fn from_op_return(script: &Script) -> Self {
        let mut desc = TokenGroupDescription::default();
        let Ok(chunks) = script.chunks() else {
            return desc;
        };
        let marker = marker_bytes();
        match (chunks.first(), chunks.get(1)) {
            (Some(first), Some(second))
                if first.op == OP_RETURN && second.data_or_empty() == marker.as_slice() => {}
            _ => return desc,
        }

        let mut fields = chunks[2..].iter().map(|c| c.data_or_empty());
        if let Some(ticker) = fields.next() {
            desc.ticker = String::from_utf8_lossy(ticker).into_owned();
        }
        if let Some(name) = fields.next() {
            desc.name = String::from_utf8_lossy(name).into_owned();
        }
        if let Some(decimal) = fields.next() {
            if let Some(d) = decode_amount(decimal) {
                desc.decimal_pos = d.clamp(0, u8::MAX as i64) as u8;
            }
        }
        if let Some(url) = fields.next() {
            desc.document_url = String::from_utf8_lossy(url).into_owned();
        }
        if let Some(hash) = fields.next() {
            desc.document_hash = Hash256::from_slice(hash).unwrap_or(Hash256::ZERO);
        }
        desc
    }
}

fn marker_bytes() -> Vec<u8> {
    opgroup_script::script::script_num_bytes(DESCRIPTION_MARKER)
}

/// Description fields as entered by a user, before they become a payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DescriptionParams {
    pub ticker: String,
    pub name: String,
    pub decimal_pos: Option<u8>,
    pub document_url: Option<String>,
    pub document_hash: Option<Hash256>,
    /// The trailing `true`/`false` literal; not part of the payload.
    pub confirmed: bool,
}

impl DescriptionParams {
    /// Build the OP_RETURN payload. Absent trailing fields are pushed empty.
    pub fn to_op_return(&self) -> Result<Script, TokenError> {
        let mut script = Script::new();
        script.push_opcode(OP_RETURN)?;
        script.push_int(DESCRIPTION_MARKER)?;
        script.push_data(self.ticker.as_bytes())?;
        script.push_data(self.name.as_bytes())?;
        match self.decimal_pos {
            Some(d) => script.push_data(&encode_amount(d as i64))?,
            None => script.push_data(&[])?,
        };
        script.push_data(self.document_url.as_deref().unwrap_or("").as_bytes())?;
        match &self.document_hash {
            Some(h) => script.push_data(h.as_bytes())?,
            None => script.push_data(&[])?,
        };
        Ok(script)
    }

    /// The description the payload will decode to.
    pub fn to_description(&self) -> TokenGroupDescription {
        TokenGroupDescription {
            ticker: self.ticker.clone(),
            name: self.name.clone(),
            decimal_pos: self.decimal_pos.unwrap_or(DEFAULT_DECIMAL_POS),
            document_url: self.document_url.clone().unwrap_or_default(),
            document_hash: self.document_hash.unwrap_or(Hash256::ZERO),
        }
    }
}

fn confirm_literal(s: &str) -> Option<bool> {
    match s {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse positional description parameters.
///
/// Accepts `ticker name [decimal [url hash]] [true|false]`. Ticker and name
/// are required; a `true`/`false` literal in any later position ends the
/// list and sets the confirm flag.
///
/// # Returns
/// The parameters, or `InvalidDescription` naming the first bad field.
pub fn parse_description_params(params: &[&str]) -> Result<DescriptionParams, TokenError> {
    let bad = |msg: String| TokenError::InvalidDescription(msg);
    let mut it = params.iter().copied();

    let ticker = it.next().ok_or_else(|| bad("missing parameter: token ticker".into()))?;
    if ticker.chars().count() > MAX_TICKER_LEN {
        return Err(bad(format!("ticker {} has too many characters ({} max)", ticker, MAX_TICKER_LEN)));
    }
    let name = it.next().ok_or_else(|| bad("missing parameter: token name".into()))?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(bad(format!("name {} has too many characters ({} max)", name, MAX_NAME_LEN)));
    }
    let mut out = DescriptionParams {
        ticker: ticker.to_string(),
        name: name.to_string(),
        ..Default::default()
    };

    let Some(decimal) = it.next() else { return Ok(out) };
    if let Some(confirmed) = confirm_literal(decimal) {
        out.confirmed = confirmed;
        return Ok(out);
    }
    let decimal_pos = decimal
        .parse::<u8>()
        .ok()
        .filter(|d| *d <= MAX_DECIMAL_POS)
        .ok_or_else(|| bad(format!("decimal position {} is invalid, valid values are 0 to 16", decimal)))?;
    out.decimal_pos = Some(decimal_pos);

    let Some(url) = it.next() else { return Ok(out) };
    if let Some(confirmed) = confirm_literal(url) {
        out.confirmed = confirmed;
        return Ok(out);
    }
    if !url.contains(':') {
        return Err(bad(format!("{} is not a URL", url)));
    }
    if url.chars().count() > MAX_URL_LEN {
        return Err(bad(format!("URL {} has too many characters ({} max)", url, MAX_URL_LEN)));
    }
    out.document_url = Some(url.to_string());

    let hash = it.next().ok_or_else(|| bad("missing parameter: documentation hash".into()))?;
    let document_hash = hash
        .parse::<Hash256>()
        .map_err(|e| bad(format!("documentation hash {}: {}", hash, e)))?;
    out.document_hash = Some(document_hash);

    if let Some(flag) = it.next() {
        out.confirmed = confirm_literal(flag)
            .ok_or_else(|| bad(format!("unexpected parameter {}", flag)))?;
    }
    Ok(out)
}
