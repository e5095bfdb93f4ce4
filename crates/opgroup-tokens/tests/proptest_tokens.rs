//! Property tests for the grouped-script codec, amount display conversion,
//! identifier derivation and balance conservation.

use std::collections::{BTreeMap, HashSet};

use opgroup_primitives::hash::Hash256;
use opgroup_script::{Destination, Script};
use opgroup_tokens::amount::{amount_from_display_value, display_value_from_amount, MAX_TOKEN_AMOUNT};
use opgroup_tokens::codec::{build_group_script, parse_group_script};
use opgroup_tokens::derivation::{derive_group_id, group_id_hash};
use opgroup_tokens::{
    check_token_groups, AuthorityFlags, Coin, GroupId, GroupParse, GroupPayload, GroupRegistry, IdFlags,
    TokenParams,
};
use opgroup_transaction::{OutPoint, Transaction, TransactionOutput};
use proptest::prelude::*;

fn group(index: u8) -> GroupId {
    let mut bytes = vec![index + 1; 32];
    bytes[31] = 0;
    GroupId::new(bytes)
}

fn arb_destination() -> impl Strategy<Value = Destination> {
    prop_oneof![
        any::<[u8; 20]>().prop_map(Destination::KeyHash),
        any::<[u8; 20]>().prop_map(Destination::ScriptHash),
    ]
}

fn arb_payload() -> impl Strategy<Value = GroupPayload> {
    let quantity = prop_oneof![
        Just(1i64),
        Just(255),
        Just(256),
        Just(65_535),
        Just(65_536),
        Just(u32::MAX as i64),
        Just(u32::MAX as i64 + 1),
        Just(i64::MAX),
        1..=i64::MAX,
    ]
    .prop_map(GroupPayload::Quantity);
    let authority = (any::<u16>(), 0u64..(1 << 48)).prop_map(|(bits, nonce)| {
        GroupPayload::Authority(AuthorityFlags(((bits as u64) << 48) | (1 << 63) | nonce))
    });
    prop_oneof![quantity, authority]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Building then parsing a grouped script recovers the group, payload
    /// and destination.
    #[test]
    fn grouped_script_roundtrip(
        dest in arb_destination(),
        id in prop::collection::vec(any::<u8>(), 32..48),
        payload in arb_payload(),
    ) {
        let id = GroupId::new(id);
        let script = build_group_script(&dest, &id, payload);
        let GroupParse::Grouped(info) = parse_group_script(&script) else {
            panic!("not grouped");
        };
        prop_assert_eq!(&info.group, &id);
        prop_assert_eq!(info.payload, payload);
        prop_assert_eq!(Destination::from_script(&info.template), dest);
    }

    /// Parsing arbitrary bytes never panics.
    #[test]
    fn parse_arbitrary_script(bytes in prop::collection::vec(any::<u8>(), 0..120)) {
        let _ = parse_group_script(&Script::from_bytes(&bytes));
    }

    /// A grouped script with one OP_DROP removed, or with its template
    /// swapped for anything other than a pay-to-key-hash or
    /// pay-to-script-hash script, is malformed.
    #[test]
    fn corrupted_grouped_script_is_malformed(
        dest in arb_destination(),
        payload in arb_payload(),
        drop_one in any::<bool>(),
        tail in prop::collection::vec(any::<u8>(), 0..40),
    ) {
        let script = build_group_script(&dest, &group(0), payload);
        let bytes = script.as_bytes();
        let template_len = dest.locking_script().len();
        let prefix_len = bytes.len() - template_len;
        let corrupted = if drop_one {
            let mut out = bytes.to_vec();
            out.remove(prefix_len - 1);
            out
        } else {
            let replacement = Script::from_bytes(&tail);
            prop_assume!(!replacement.is_p2pkh() && !replacement.is_p2sh());
            let mut out = bytes[..prefix_len].to_vec();
            out.extend_from_slice(&tail);
            out
        };
        prop_assert!(parse_group_script(&Script::from_bytes(&corrupted)).is_malformed());
    }

    /// Display conversion round-trips at the supported decimal positions.
    #[test]
    fn display_value_roundtrip(
        amount in prop_oneof![Just(0i64), Just(MAX_TOKEN_AMOUNT), Just(-MAX_TOKEN_AMOUNT), -MAX_TOKEN_AMOUNT..=MAX_TOKEN_AMOUNT],
        decimal_pos in prop_oneof![Just(0u8), Just(2u8), Just(8u8), Just(16u8)],
    ) {
        let text = display_value_from_amount(amount, decimal_pos);
        prop_assert_eq!(amount_from_display_value(&text, decimal_pos).unwrap(), amount);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// A derived id always carries the requested flags byte.
    #[test]
    fn derived_id_carries_flags(
        txid in any::<[u8; 32]>(),
        vout in any::<u32>(),
        flags in prop_oneof![Just(IdFlags::NONE), Just(IdFlags::SAME_SCRIPT), Just(IdFlags::BALANCE_NATIVE)],
    ) {
        let outpoint = OutPoint::new(Hash256::new(txid), vout);
        let (id, nonce) = derive_group_id(&outpoint, &Script::new(), flags, 1 << 20).unwrap();
        prop_assert_eq!(id.id_flags(), flags);
        prop_assert!(nonce != 0);
    }
}

/// Ten thousand consecutive nonces never collide.
#[test]
fn distinct_nonces_do_not_collide() {
    let outpoint = OutPoint::new(Hash256::new([5; 32]), 0);
    let hashes: HashSet<Hash256> = (1..=10_000u64)
        .map(|nonce| group_id_hash(&outpoint, &Script::new(), nonce))
        .collect();
    assert_eq!(hashes.len(), 10_000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Without authorities a transaction is valid exactly when every group
    /// balances.
    #[test]
    fn conservation_without_authorities(
        inputs in prop::collection::vec((0u8..3, 1i64..1_000), 0..10),
        outputs in prop::collection::vec((0u8..3, 1i64..1_000), 0..10),
    ) {
        let registry = GroupRegistry::new(TokenParams::default());
        let dest = Destination::KeyHash([1; 20]);
        let mut view = BTreeMap::new();
        let mut tx = Transaction::new();
        let mut sums: BTreeMap<u8, (i64, i64)> = BTreeMap::new();

        // A plain funding input keeps the transaction from looking like a
        // coinbase.
        let funding = OutPoint::new(Hash256::new([0xf0; 32]), 0);
        view.insert(funding, Coin::new(TransactionOutput::new(50_000, dest.locking_script()), 1));
        tx.add_input(funding);

        for (i, (g, q)) in inputs.iter().enumerate() {
            let op = OutPoint::new(Hash256::new([0xa0; 32]), i as u32);
            let script = build_group_script(&dest, &group(*g), GroupPayload::Quantity(*q));
            view.insert(op, Coin::new(TransactionOutput::new(10_000, script), 1));
            tx.add_input(op);
            sums.entry(*g).or_default().0 += q;
        }
        for (g, q) in &outputs {
            let script = build_group_script(&dest, &group(*g), GroupPayload::Quantity(*q));
            tx.add_output(TransactionOutput::new(10_000, script));
            sums.entry(*g).or_default().1 += q;
        }

        let balanced = sums.values().all(|(i, o)| i == o);
        let result = check_token_groups(&tx, &view, &registry);
        prop_assert_eq!(result.is_ok(), balanced);
        if let Ok(balances) = result {
            for (g, (i, o)) in &sums {
                let bal = &balances[&group(*g)];
                prop_assert_eq!((bal.input, bal.output), (*i, *o));
            }
        }
    }
}
