//! Group creation records.

use std::fmt;

use opgroup_script::Script;
use opgroup_transaction::Transaction;
use serde::{Deserialize, Serialize};

use crate::codec::{parse_group_script, GroupParse, GroupPayload, TokenGroupInfo};
use crate::description::TokenGroupDescription;
use crate::flags::{AuthorityFlags, IdFlags};
use crate::group_id::GroupId;

/// Messages accumulated while filtering a creation's description.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGroupStatus {
    pub messages: Vec<String>,
}

impl TokenGroupStatus {
    pub fn add_message(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.messages.iter().any(|m| m == message)
    }
}

impl fmt::Display for TokenGroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join(" "))
    }
}

/// A group as created on chain: the creating transaction, its creation
/// output, the description from its first OP_RETURN and filter status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGroupCreation {
    pub creation_tx: Transaction,
    pub info: TokenGroupInfo,
    pub description: TokenGroupDescription,
    pub status: TokenGroupStatus,
}

impl TokenGroupCreation {
    pub fn new(creation_tx: Transaction, info: TokenGroupInfo, description: TokenGroupDescription) -> Self {
        TokenGroupCreation {
            creation_tx,
            info,
            description,
            status: TokenGroupStatus::default(),
        }
    }

    /// The synthetic entry standing for the native asset.
    pub fn native(description: TokenGroupDescription) -> Self {
        let info = TokenGroupInfo {
            group: GroupId::no_group(),
            payload: GroupPayload::Authority(AuthorityFlags::ALL),
            template: Script::new(),
        };
        TokenGroupCreation::new(Transaction::new(), info, description)
    }

    pub fn group(&self) -> &GroupId {
        &self.info.group
    }

    /// A creation is only meaningful when its defining output is an
    /// authority.
    pub fn is_valid(&self) -> bool {
        self.info.is_authority()
    }
}

/// Find the creation output and first OP_RETURN of a transaction.
///
/// The OP_RETURN must carry zero native value. Any malformed grouped output
/// disqualifies the whole transaction.
///
/// # Returns
/// The first group-creation output's info and the first OP_RETURN script
/// (empty when there is none), or `None`.
pub fn configuration_parameters(tx: &Transaction) -> Option<(TokenGroupInfo, Script)> {
    let mut first_op_return: Option<Script> = None;
    let mut creation: Option<TokenGroupInfo> = None;
    for output in &tx.outputs {
        if output.value == 0 && first_op_return.is_none() && output.script_pubkey.is_op_return() {
            first_op_return = Some(output.script_pubkey.clone());
        }
        match parse_group_script(&output.script_pubkey) {
            GroupParse::Malformed(_) => return None,
            GroupParse::Grouped(info)
                if creation.is_none() && !info.group.is_no_group() && info.is_group_creation(IdFlags::NONE) =>
            {
                creation = Some(info);
            }
            _ => {}
        }
    }
    creation.map(|info| (info, first_op_return.unwrap_or_default()))
}

/// Build the creation record a transaction defines, if any.
pub fn creation_from_transaction(tx: &Transaction) -> Option<TokenGroupCreation> {
    let (info, op_return) = configuration_parameters(tx)?;
    let description = TokenGroupDescription::from_op_return(&op_return);
    Some(TokenGroupCreation::new(tx.clone(), info, description))
}

/// True when any output is a group creation whose id carries `id_flags`.
pub fn is_any_output_group_creation(tx: &Transaction, id_flags: IdFlags) -> bool {
    tx.outputs.iter().any(|o| {
        parse_group_script(&o.script_pubkey)
            .grouped()
            .is_some_and(|info| info.is_group_creation(id_flags))
    })
}
