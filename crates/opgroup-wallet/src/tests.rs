use std::collections::BTreeMap;

use opgroup_script::{Address, Destination, Network};
use opgroup_tokens::codec::parse_group_script;
use opgroup_tokens::creation::creation_from_transaction;
use opgroup_tokens::description::DescriptionParams;
use opgroup_tokens::registry::ManagementSlot;
use opgroup_tokens::{
    check_token_groups, AuthorityFlags, Coin, GroupId, GroupRegistry, IdFlags, SharedRegistry, TokenParams,
};
use opgroup_transaction::{OutPoint, Transaction, TransactionOutput};

use crate::*;

const MGT_KEY: [u8; 20] = [0xaa; 20];

fn params() -> TokenParams {
    let mut params = TokenParams::default();
    params.management.address = Some(Address::new(Destination::KeyHash(MGT_KEY), Network::Mainnet));
    params
}

fn description(ticker: &str, name: &str, decimal_pos: u8) -> DescriptionParams {
    DescriptionParams {
        ticker: ticker.to_string(),
        name: name.to_string(),
        decimal_pos: Some(decimal_pos),
        confirmed: true,
        ..Default::default()
    }
}

fn new_wallet(funding: &[u64]) -> (TokenWallet<MemoryWallet>, SharedRegistry) {
    let backend = MemoryWallet::new(1);
    for value in funding {
        backend.fund(*value);
    }
    let registry = GroupRegistry::new(params()).into_shared();
    (TokenWallet::new(backend, registry.clone()), registry)
}

/// The wallet's coins as a validation view.
fn view(wallet: &TokenWallet<MemoryWallet>) -> BTreeMap<OutPoint, Coin> {
    wallet
        .backend()
        .coins()
        .into_iter()
        .map(|c| (c.outpoint, Coin::new(c.output, 100)))
        .collect()
}

fn register(registry: &SharedRegistry, tx: &Transaction) {
    let creation = creation_from_transaction(tx).expect("creation transaction");
    registry.write().add_group(creation).expect("registered");
}

/// Configure GRV (decimal 2) on a single 100000 coin and register it.
fn configured_wallet() -> (TokenWallet<MemoryWallet>, SharedRegistry, GroupId) {
    let (wallet, registry) = new_wallet(&[100_000]);
    let configured = wallet.configure(&description("GRV", "Gravity", 2), None).expect("configure");
    let tx = configured.transaction.expect("committed");
    register(&registry, &tx);
    (wallet, registry, configured.group)
}

fn grouped_quantities(tx: &Transaction, group: &GroupId) -> Vec<i64> {
    tx.outputs
        .iter()
        .filter_map(|o| parse_group_script(&o.script_pubkey).into_grouped())
        .filter(|info| info.group == *group && !info.is_authority())
        .map(|info| info.quantity())
        .collect()
}

fn authorities(tx: &Transaction, group: &GroupId) -> Vec<AuthorityFlags> {
    tx.outputs
        .iter()
        .filter_map(|o| parse_group_script(&o.script_pubkey).into_grouped())
        .filter(|info| info.group == *group && info.is_authority())
        .map(|info| info.flags())
        .collect()
}

// -----------------------------------------------------------------------
// Configure
// -----------------------------------------------------------------------

#[test]
fn test_configure_creates_full_authority() {
    let (wallet, registry) = new_wallet(&[100_000]);
    let before = view(&wallet);
    let configured = wallet.configure(&description("GRV", "Gravity", 2), None).unwrap();
    let tx = configured.transaction.clone().unwrap();

    let auths = authorities(&tx, &configured.group);
    assert_eq!(auths.len(), 1);
    assert_eq!(auths[0].renewable(), AuthorityFlags::ALL);
    assert_ne!(auths[0].nonce(), 0);
    assert!(tx.outputs[0].script_pubkey.is_op_return());

    let balances = check_token_groups(&tx, &before, &registry.read()).unwrap();
    assert_eq!(balances[&configured.group].ctrl_perms, AuthorityFlags::ALL);

    register(&registry, &tx);
    let reg = registry.read();
    assert_eq!(reg.lookup_by_ticker("GRV"), Some(&configured.group));
    assert_eq!(reg.get_creation(&configured.group).unwrap().description.decimal_pos, 2);
    assert_eq!(wallet.backend().outstanding_reservations(), 0);
}

#[test]
fn test_configure_dry_run_commits_nothing() {
    let (wallet, _registry) = new_wallet(&[100_000]);
    let mut params = description("GR1", "Gravity", 2);
    params.confirmed = false;
    let configured = wallet.configure(&params, None).unwrap();

    assert!(configured.transaction.is_none());
    assert!(configured.group.is_user_group());
    assert!(configured.description.ticker.is_empty());
    assert!(!configured.status.is_empty());
    assert!(wallet.backend().committed().is_empty());
    assert_eq!(wallet.backend().outstanding_reservations(), 0);
}

#[test]
fn test_configure_without_coins() {
    let (wallet, _registry) = new_wallet(&[]);
    let err = wallet.configure(&description("GRV", "Gravity", 2), None).unwrap_err();
    assert!(matches!(err, WalletError::NoCoins(_)));
}

#[test]
fn test_keypool_exhausted_releases_and_commits_nothing() {
    let backend = MemoryWallet::new(1).with_key_limit(1);
    backend.fund(100_000);
    let wallet = TokenWallet::new(backend, GroupRegistry::new(params()).into_shared());
    let err = wallet.configure(&description("GRV", "Gravity", 2), None).unwrap_err();
    assert!(matches!(err, WalletError::KeypoolExhausted));
    assert!(wallet.backend().committed().is_empty());
}

#[test]
fn test_rejected_commit_leaves_coins() {
    let (wallet, _registry) = new_wallet(&[100_000]);
    wallet.backend().reject_commits("mempool full");
    let err = wallet.configure(&description("GRV", "Gravity", 2), None).unwrap_err();
    assert!(matches!(err, WalletError::CommitRejected(_)));
    assert_eq!(wallet.backend().coins().len(), 1);
    assert_eq!(wallet.backend().outstanding_reservations(), 0);
}

// -----------------------------------------------------------------------
// Mint, melt, send
// -----------------------------------------------------------------------

/// "5.00" at two decimals mints 500 units and renews the authority.
#[test]
fn test_mint_display_amount() {
    let (wallet, registry, group) = configured_wallet();
    let amount = registry.read().amount_from_display_value("5.00", &group).unwrap();
    assert_eq!(amount, 500);

    let before = view(&wallet);
    let dest = wallet.backend().new_destination();
    let tx = wallet.mint(&group, &[Recipient::new(dest.clone(), amount)]).unwrap();

    assert_eq!(grouped_quantities(&tx, &group), vec![500]);
    assert_eq!(authorities(&tx, &group), vec![AuthorityFlags::ALL]);
    let balances = check_token_groups(&tx, &before, &registry.read()).unwrap();
    assert_eq!(balances[&group].input, 0);
    assert_eq!(balances[&group].output, 500);

    assert_eq!(wallet.group_balance(&group, &Destination::None), 500);
    assert_eq!(wallet.group_balance(&group, &dest), 500);
    assert_eq!(wallet.group_balance(&group, &Destination::KeyHash([1; 20])), 0);
}

#[test]
fn test_mint_unknown_group() {
    let (wallet, _registry, _group) = configured_wallet();
    let unknown = GroupId::new(vec![9; 32]);
    let dest = wallet.backend().new_destination();
    let err = wallet.mint(&unknown, &[Recipient::new(dest, 1)]).unwrap_err();
    assert!(matches!(err, WalletError::UnknownGroup(_)));
}

#[test]
fn test_mint_rejects_non_positive_amount() {
    let (wallet, _registry, group) = configured_wallet();
    let dest = wallet.backend().new_destination();
    let err = wallet.mint(&group, &[Recipient::new(dest, 0)]).unwrap_err();
    assert!(matches!(err, WalletError::InvalidParameter(_)));
}

#[test]
fn test_recipient_amount_above_money_range() {
    let (wallet, _registry, group) = configured_wallet();
    let dest = wallet.backend().new_destination();
    let too_much = opgroup_tokens::amount::MAX_TOKEN_AMOUNT + 1;
    let err = wallet.mint(&group, &[Recipient::new(dest.clone(), too_much)]).unwrap_err();
    assert!(matches!(err, WalletError::InvalidParameter(_)));
    let err = wallet.send(&group, &[Recipient::new(dest, too_much)]).unwrap_err();
    assert!(matches!(err, WalletError::InvalidParameter(_)));
    assert_eq!(wallet.backend().outstanding_reservations(), 0);
}

/// Melting more than the wallet holds builds nothing.
#[test]
fn test_melt_beyond_holdings() {
    let (wallet, _registry, group) = configured_wallet();
    let dest = wallet.backend().new_destination();
    wallet.mint(&group, &[Recipient::new(dest, 500)]).unwrap();
    let committed = wallet.backend().committed().len();

    let err = wallet.melt(&group, 1000).unwrap_err();
    match err {
        WalletError::InsufficientFunds { asset, needed, available } => {
            assert_eq!(asset, "GRV");
            assert_eq!(needed, 1000);
            assert_eq!(available, 500);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(wallet.backend().committed().len(), committed);
    assert_eq!(wallet.backend().outstanding_reservations(), 0);
    assert_eq!(wallet.group_balance(&group, &Destination::None), 500);
}

#[test]
fn test_melt_returns_change() {
    let (wallet, registry, group) = configured_wallet();
    let dest = wallet.backend().new_destination();
    wallet.mint(&group, &[Recipient::new(dest, 500)]).unwrap();

    let before = view(&wallet);
    let tx = wallet.melt(&group, 200).unwrap();
    assert_eq!(grouped_quantities(&tx, &group), vec![300]);
    let balances = check_token_groups(&tx, &before, &registry.read()).unwrap();
    assert_eq!(balances[&group].input, 500);
    assert_eq!(balances[&group].output, 300);
    assert_eq!(wallet.group_balance(&group, &Destination::None), 300);
}

#[test]
fn test_send_to_foreign_destination() {
    let (wallet, registry, group) = configured_wallet();
    let dest = wallet.backend().new_destination();
    wallet.mint(&group, &[Recipient::new(dest, 500)]).unwrap();

    let before = view(&wallet);
    let foreign = Destination::KeyHash([0x42; 20]);
    let tx = wallet.send(&group, &[Recipient::new(foreign, 120)]).unwrap();

    let mut quantities = grouped_quantities(&tx, &group);
    quantities.sort_unstable();
    assert_eq!(quantities, vec![120, 380]);
    assert!(authorities(&tx, &group).is_empty());
    check_token_groups(&tx, &before, &registry.read()).unwrap();
    assert_eq!(wallet.group_balance(&group, &Destination::None), 380);
}

#[test]
fn test_send_insufficient() {
    let (wallet, _registry, group) = configured_wallet();
    let err = wallet.send(&group, &[Recipient::new(Destination::KeyHash([0x42; 20]), 1)]).unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { needed: 1, available: 0, .. }));
}

#[test]
fn test_native_shortfall() {
    // The creation coin only just covers the authority dust.
    let (wallet, _registry) = new_wallet(&[10_001]);
    let err = wallet.configure(&description("GRV", "Gravity", 2), None).unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { .. }));
}

// -----------------------------------------------------------------------
// Authorities
// -----------------------------------------------------------------------

#[test]
fn test_create_authorities() {
    let (wallet, registry, group) = configured_wallet();
    let before = view(&wallet);
    let dest = wallet.backend().new_destination();
    let tx = wallet.create_authorities(&group, &dest, AuthorityFlags::MINT).unwrap();

    let mut auths = authorities(&tx, &group);
    auths.sort_by_key(|f| f.0);
    assert_eq!(auths, vec![AuthorityFlags::CTRL | AuthorityFlags::MINT, AuthorityFlags::ALL]);
    check_token_groups(&tx, &before, &registry.read()).unwrap();
    assert_eq!(wallet.list_authorities(Some(&group)).len(), 2);
    assert_eq!(wallet.list_authorities(None).len(), 2);
}

#[test]
fn test_drop_authorities_keeps_rest() {
    let (wallet, registry, group) = configured_wallet();
    let authority = wallet.list_authorities(Some(&group)).remove(0);
    let before = view(&wallet);

    let dropped = wallet.drop_authorities(&group, &authority.outpoint, AuthorityFlags::MINT).unwrap();
    assert_eq!(dropped.former.renewable(), AuthorityFlags::ALL);
    assert_eq!(dropped.kept, AuthorityFlags::ALL & !AuthorityFlags::MINT);
    assert_eq!(authorities(&dropped.transaction, &group), vec![dropped.kept]);
    check_token_groups(&dropped.transaction, &before, &registry.read()).unwrap();

    let (_, held) = wallet.group_balance_and_authorities(&group, &Destination::None);
    assert!(!held.allows_mint());
    assert!(held.allows_melt());
}

/// Dropping everything but CTRL destroys the authority.
#[test]
fn test_drop_authorities_to_ctrl_destroys() {
    let (wallet, _registry, group) = configured_wallet();
    let authority = wallet.list_authorities(Some(&group)).remove(0);
    let drop = AuthorityFlags::ALL & !AuthorityFlags::CTRL;

    let dropped = wallet.drop_authorities(&group, &authority.outpoint, drop).unwrap();
    assert_eq!(dropped.kept, AuthorityFlags::NONE);
    assert!(authorities(&dropped.transaction, &group).is_empty());
    assert!(wallet.list_authorities(Some(&group)).is_empty());
}

/// An authority without CCHILD cannot hand back a reduced authority, so
/// only dropping it whole builds a transaction.
#[test]
fn test_drop_authorities_without_child_flag() {
    let (wallet, registry, group) = configured_wallet();
    let dest = wallet.backend().new_destination();
    wallet.create_authorities(&group, &dest, AuthorityFlags::MINT | AuthorityFlags::MELT).unwrap();
    let child = wallet
        .list_authorities(Some(&group))
        .into_iter()
        .find(|c| !c.authority_flags().allows_renew())
        .unwrap();
    assert_eq!(child.authority_flags().renewable(), AuthorityFlags::CTRL | AuthorityFlags::MINT | AuthorityFlags::MELT);
    let committed = wallet.backend().committed().len();

    let err = wallet.drop_authorities(&group, &child.outpoint, AuthorityFlags::MELT).unwrap_err();
    assert!(matches!(err, WalletError::InvalidParameter(_)));
    assert_eq!(wallet.backend().committed().len(), committed);
    assert_eq!(wallet.backend().outstanding_reservations(), 0);

    let before = view(&wallet);
    let drop = AuthorityFlags::MINT | AuthorityFlags::MELT;
    let dropped = wallet.drop_authorities(&group, &child.outpoint, drop).unwrap();
    assert_eq!(dropped.kept, AuthorityFlags::NONE);
    assert!(authorities(&dropped.transaction, &group).is_empty());
    check_token_groups(&dropped.transaction, &before, &registry.read()).unwrap();
    assert_eq!(wallet.list_authorities(Some(&group)).len(), 1);
}

#[test]
fn test_drop_authorities_unknown_coin() {
    let (wallet, _registry, group) = configured_wallet();
    let missing = OutPoint::null();
    let err = wallet.drop_authorities(&group, &missing, AuthorityFlags::MINT).unwrap_err();
    assert!(matches!(err, WalletError::CoinUnavailable(_)));
}

#[test]
fn test_subgroup_mint_uses_parent_authority() {
    let (wallet, registry, group) = configured_wallet();
    let subgroup = subgroup_id(&group, "7").unwrap();
    let before = view(&wallet);
    let dest = wallet.backend().new_destination();

    let tx = wallet.mint(&subgroup, &[Recipient::new(dest, 40)]).unwrap();
    assert_eq!(grouped_quantities(&tx, &subgroup), vec![40]);
    assert_eq!(authorities(&tx, &group), vec![AuthorityFlags::ALL]);
    check_token_groups(&tx, &before, &registry.read()).unwrap();
}

// -----------------------------------------------------------------------
// Subgroup ids
// -----------------------------------------------------------------------

#[test]
fn test_subgroup_id_postfixes() {
    let group = GroupId::new(vec![3; 32]);
    let numeric = subgroup_id(&group, "258").unwrap();
    assert_eq!(numeric.subgroup_data(), &258i64.to_le_bytes());
    assert_eq!(numeric.parent_group(), group);

    let text = subgroup_id(&group, "gold").unwrap();
    assert_eq!(text.subgroup_data(), b"gold");
}

#[test]
fn test_subgroup_id_rejects() {
    let group = GroupId::new(vec![3; 32]);
    assert!(subgroup_id(&group, "").is_err());
    assert!(subgroup_id(&GroupId::no_group(), "1").is_err());
}

// -----------------------------------------------------------------------
// Management groups and fees
// -----------------------------------------------------------------------

const FEE_COIN: i64 = 100_000_000;

/// A wallet holding 10 FEE tokens, with FEE registered as the fee token.
fn fee_wallet() -> (TokenWallet<MemoryWallet>, SharedRegistry, GroupId) {
    let (wallet, registry) = new_wallet(&[100_000, 100_000, 100_000]);
    let mgt = Destination::KeyHash(MGT_KEY);
    wallet.backend().add_coin(TransactionOutput::new(50_000, mgt.locking_script()), 1);

    let configured = wallet.configure_management(&description("FEE", "Fee", 8), None).unwrap();
    let tx = configured.transaction.unwrap();
    assert!(configured.group.has_flag(IdFlags::MANAGEMENT));
    register(&registry, &tx);
    assert!(registry.read().matches_management(ManagementSlot::Fee, &configured.group));

    let dest = wallet.backend().new_destination();
    wallet.mint(&configured.group, &[Recipient::new(dest, 10 * FEE_COIN)]).unwrap();
    (wallet, registry, configured.group)
}

#[test]
fn test_configure_management_needs_management_coin() {
    let (wallet, _registry) = new_wallet(&[100_000]);
    let err = wallet.configure_management(&description("FEE", "Fee", 8), None).unwrap_err();
    assert!(matches!(err, WalletError::NoCoins(_)));
}

#[test]
fn test_configure_pays_creation_fee() {
    let (wallet, registry, fee_group) = fee_wallet();
    let before = view(&wallet);

    let configured = wallet.configure(&description("GRV", "Gravity", 2), None).unwrap();
    let tx = configured.transaction.unwrap();
    let base = registry.read().management_fee(0).unwrap();
    assert_eq!(configured.fee_needed, 5 * base);
    assert_eq!(configured.fee_available, 10 * FEE_COIN);

    let reg = registry.read();
    assert_eq!(reg.management_fees_paid(&tx.outputs), 5 * base);
    let balances = check_token_groups(&tx, &before, &reg).unwrap();
    assert_eq!(reg.check_management_fees(&tx, &balances, 0), Ok(5 * base));
    assert_eq!(balances[&fee_group].output, 10 * FEE_COIN);
}

#[test]
fn test_send_fee_token_pays_fee() {
    let (wallet, registry, fee_group) = fee_wallet();
    let before = view(&wallet);
    let tx = wallet.send(&fee_group, &[Recipient::new(Destination::KeyHash([0x42; 20]), FEE_COIN)]).unwrap();

    let reg = registry.read();
    let base = reg.management_fee(0).unwrap();
    assert_eq!(reg.management_fees_paid(&tx.outputs), base);
    let balances = check_token_groups(&tx, &before, &reg).unwrap();
    assert_eq!(reg.check_management_fees(&tx, &balances, 0), Ok(base));
}

#[test]
fn test_balances_and_authorities() {
    let (wallet, _registry, fee_group) = fee_wallet();
    let (balances, auths) = wallet.all_group_balances_and_authorities();
    assert_eq!(balances[&fee_group], 10 * FEE_COIN);
    assert_eq!(auths[&fee_group], AuthorityFlags::ALL);
    assert_eq!(wallet.all_group_balances(), balances);
}
