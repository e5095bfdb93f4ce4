use proptest::prelude::*;

use opgroup_primitives::base58;
use opgroup_primitives::util::{ByteReader, ByteWriter};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn compact_size_roundtrip(n in any::<u64>()) {
        let mut w = ByteWriter::new();
        w.write_compact_size(n);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        prop_assert_eq!(r.read_compact_size().unwrap(), n);
        prop_assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn base58check_roundtrip(version in any::<u8>(), payload in prop::collection::vec(any::<u8>(), 0..40)) {
        let s = base58::check_encode(version, &payload);
        let (v, p) = base58::check_decode(&s).unwrap();
        prop_assert_eq!(v, version);
        prop_assert_eq!(p, payload);
    }
}
