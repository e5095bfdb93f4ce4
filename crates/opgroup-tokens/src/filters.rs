//! Description filters run on every creation before it enters the registry.
//!
//! Filters never reject a creation. An offending field is blanked and a
//! message is appended to the creation's status.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::amount::MAX_DECIMAL_POS;
use crate::creation::TokenGroupCreation;
use crate::description::{TokenGroupDescription, DEFAULT_DECIMAL_POS};
use crate::group_id::GroupId;

pub const MSG_TICKER_LETTERS: &str = "Token ticker can only contain letters.";
pub const MSG_NAME_LETTERS: &str = "Token name can only contain letters.";
pub const MSG_URL_UNPARSEABLE: &str = "Token description document URL cannot be parsed.";
pub const MSG_DECIMAL_TOO_LARGE: &str = "Token decimal separation position is too large.";
pub const MSG_TICKER_EXISTS: &str = "Token ticker already exists.";
pub const MSG_NAME_EXISTS: &str = "Token name already exists.";

static RE_ONLY_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]+$").expect("static regex"));
static RE_DOCUMENT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?|ftp)://(-\.)?([^\s/?\.#-]+\.?)+(/[^\s]*)?$").expect("static regex")
});

/// A filter sees the candidate and the groups already registered.
pub type DescriptionFilter = fn(&mut TokenGroupCreation, &BTreeMap<GroupId, TokenGroupCreation>);

/// Character classes, then uniqueness, then ticker upper-casing.
pub fn default_filters() -> Vec<DescriptionFilter> {
    vec![filter_characters, filter_uniqueness, filter_upper_case_ticker]
}

/// Ticker and name must be letters only, the URL must parse, and the
/// decimal position must not exceed 16 (clamped to 8 otherwise).
pub fn filter_characters(creation: &mut TokenGroupCreation, _groups: &BTreeMap<GroupId, TokenGroupCreation>) {
    let desc = &mut creation.description;
    let status = &mut creation.status;
    if !desc.ticker.is_empty() && !RE_ONLY_LETTERS.is_match(&desc.ticker) {
        status.add_message(MSG_TICKER_LETTERS);
        desc.ticker.clear();
    }
    if !desc.name.is_empty() && !RE_ONLY_LETTERS.is_match(&desc.name) {
        status.add_message(MSG_NAME_LETTERS);
        desc.name.clear();
    }
    if !desc.document_url.is_empty() && !RE_DOCUMENT_URL.is_match(&desc.document_url) {
        status.add_message(MSG_URL_UNPARSEABLE);
        desc.document_url.clear();
    }
    if desc.decimal_pos > MAX_DECIMAL_POS {
        status.add_message(MSG_DECIMAL_TOO_LARGE);
        desc.decimal_pos = DEFAULT_DECIMAL_POS;
    }
}

/// Ticker and name must not match, case-insensitively, those of any other
/// valid registered group. Invalid creations neither claim nor lose a
/// ticker or name.
pub fn filter_uniqueness(creation: &mut TokenGroupCreation, groups: &BTreeMap<GroupId, TokenGroupCreation>) {
    if !creation.is_valid() {
        return;
    }
    let others: Vec<&TokenGroupDescription> = groups
        .iter()
        .filter(|(gid, c)| **gid != creation.info.group && c.is_valid())
        .map(|(_, c)| &c.description)
        .collect();

    let ticker = &creation.description.ticker;
    if !ticker.is_empty() && others.iter().any(|d| d.ticker.eq_ignore_ascii_case(ticker)) {
        creation.status.add_message(MSG_TICKER_EXISTS);
        creation.description.ticker.clear();
    }
    let name = &creation.description.name;
    if !name.is_empty() && others.iter().any(|d| d.name.eq_ignore_ascii_case(name)) {
        creation.status.add_message(MSG_NAME_EXISTS);
        creation.description.name.clear();
    }
}

pub fn filter_upper_case_ticker(creation: &mut TokenGroupCreation, _groups: &BTreeMap<GroupId, TokenGroupCreation>) {
    creation.description.ticker = creation.description.ticker.to_ascii_uppercase();
}
