use eccfs_core::header::{pack_fields, unpack_fields, ChunkHeader, HEADER_SIZE};
use eccfs_core::EccError;
use proptest::prelude::*;

fn header_strategy() -> impl Strategy<Value = ChunkHeader> {
    (1u32..=31, 0u32..=31)
        .prop_flat_map(|(n, m)| (Just(n), Just(m), 0..n + m))
        .prop_flat_map(|(n, m, ci)| {
            (
                Just((n, m, ci)),
                any::<u8>(),
                proptest::array::uniform20(any::<u8>()),
                proptest::array::uniform20(any::<u8>()),
                proptest::array::uniform20(any::<u8>()),
            )
        })
        .prop_map(|((n, m, chunk_index), under_size, file_hash, cross_chunk_hash, chunk_hash)| {
            ChunkHeader { under_size, n, m, chunk_index, file_hash, cross_chunk_hash, chunk_hash }
        })
}

proptest! {
    #[test]
    fn header_round_trips(h in header_strategy()) {
        let bytes = h.to_bytes().unwrap();
        prop_assert_eq!(bytes.len(), HEADER_SIZE);
        prop_assert_eq!(bytes[0], 1);
        prop_assert_eq!(bytes[1], h.under_size);
        prop_assert_eq!(bytes[2], ((h.n << 3) | ((h.m >> 2) & 7)) as u8);
        prop_assert_eq!(bytes[3], (((h.m & 3) << 6) | h.chunk_index) as u8);
        prop_assert_eq!(&bytes[4..24], &h.file_hash[..]);
        prop_assert_eq!(&bytes[24..44], &h.cross_chunk_hash[..]);
        prop_assert_eq!(&bytes[44..64], &h.chunk_hash[..]);
        prop_assert_eq!(ChunkHeader::from_bytes(&bytes).unwrap(), h);
    }
}

#[test]
fn extreme_field_values_pack() {
    let packed = pack_fields(31, 31, 61).unwrap();
    assert_eq!(unpack_fields(packed), (31, 31, 61));
    let packed = pack_fields(1, 0, 0).unwrap();
    assert_eq!(packed, [0x08, 0x00]);
}

#[test]
fn out_of_range_fields_are_rejected() {
    for (n, m, ci) in [(32, 0, 0), (4, 32, 0), (0, 2, 0), (4, 2, 6), (31, 31, 62)] {
        let err = ChunkHeader::new(n, m, ci, 0).unwrap_err();
        assert!(matches!(err, EccError::InvalidArgument(_)), "n={n} m={m} ci={ci}: {err}");
    }
}

#[test]
fn bad_header_bytes_are_rejected() {
    let good = ChunkHeader::new(4, 2, 1, 3).unwrap().to_bytes().unwrap();

    let mut wrong_version = good;
    wrong_version[0] = 2;
    assert!(ChunkHeader::from_bytes(&wrong_version).is_err());

    assert!(ChunkHeader::from_bytes(&good[..40]).is_err());

    // n = 0
    let mut zero_n = good;
    zero_n[2] &= 0x07;
    assert!(ChunkHeader::from_bytes(&zero_n).is_err());

    // chunk index 6 with n=4, m=2
    let mut past_end = good;
    past_end[3] = (past_end[3] & 0xC0) | 6;
    assert!(ChunkHeader::from_bytes(&past_end).is_err());
}

#[test]
fn data_and_parity_rows() {
    let h = ChunkHeader::new(4, 2, 3, 0).unwrap();
    assert!(h.is_data());
    assert_eq!(h.rows(), 6);
    let p = ChunkHeader::new(4, 2, 4, 0).unwrap();
    assert!(!p.is_data());
}
