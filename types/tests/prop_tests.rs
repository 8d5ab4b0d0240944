use proptest::prelude::*;

use ibcscan_types::{BlockHash, BlockRecord, Timestamp};

proptest! {
    /// BlockRecord bincode serialization roundtrip (the on-disk encoding).
    #[test]
    fn block_record_bincode_roundtrip(
        height in any::<u64>(),
        hash in "[0-9A-F]{1,64}",
        txn in any::<u64>(),
        time in any::<u64>(),
        proposer in "[a-z0-9]{0,40}",
    ) {
        let record = BlockRecord::new(height, hash, txn, Timestamp::new(time), proposer);
        let encoded = bincode::serialize(&record).unwrap();
        let decoded: BlockRecord = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, record);
    }

    /// BlockHash ordering follows the byte order of the underlying string.
    #[test]
    fn block_hash_ordering_is_bytewise(a in "[ -~]{0,16}", b in "[ -~]{0,16}") {
        let ha = BlockHash::new(a.clone());
        let hb = BlockHash::new(b.clone());
        prop_assert_eq!(ha.cmp(&hb), a.as_bytes().cmp(b.as_bytes()));
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        prop_assert_eq!(Timestamp::new(a) <= Timestamp::new(b), a <= b);
    }
}
