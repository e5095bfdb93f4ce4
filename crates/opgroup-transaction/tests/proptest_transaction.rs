//! Property tests for transaction wire serialization.

use opgroup_primitives::hash::Hash256;
use opgroup_script::Script;
use opgroup_transaction::{OutPoint, Transaction, TransactionOutput};
use proptest::prelude::*;

fn arb_transaction() -> impl Strategy<Value = Transaction> {
    (
        any::<u32>(),
        prop::collection::vec((any::<[u8; 32]>(), any::<u32>(), prop::collection::vec(any::<u8>(), 0..80), any::<u32>()), 0..4),
        prop::collection::vec((any::<u64>(), prop::collection::vec(any::<u8>(), 0..80)), 0..4),
        any::<u32>(),
    )
        .prop_map(|(version, ins, outs, lock_time)| {
            let mut tx = Transaction::new();
            tx.version = version;
            tx.lock_time = lock_time;
            for (txid, vout, sig, seq) in ins {
                let input = tx.add_input(OutPoint::new(Hash256::new(txid), vout));
                input.script_sig = Script::from(sig);
                input.sequence = seq;
            }
            for (value, script) in outs {
                tx.add_output(TransactionOutput::new(value, Script::from(script)));
            }
            tx
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Bytes decode to an identical transaction.
    #[test]
    fn wire_roundtrip(tx in arb_transaction()) {
        let bytes = tx.to_bytes();
        prop_assert_eq!(bytes.len(), tx.serialized_size());
        let back = Transaction::from_bytes(&bytes).unwrap();
        prop_assert_eq!(back.txid(), tx.txid());
        prop_assert_eq!(back, tx);
    }
}
