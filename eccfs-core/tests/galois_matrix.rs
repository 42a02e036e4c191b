use eccfs_core::galois;
use eccfs_core::matrix::{condense, dispersal_matrix, invert, Matrix};
use eccfs_core::EccError;
use proptest::prelude::*;
use reed_solomon_erasure::galois_8;

#[test]
fn multiplication_and_division_match_reference_tables() {
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            assert_eq!(galois::mul(a, b), galois_8::mul(a, b), "{a} * {b}");
            if b != 0 {
                assert_eq!(galois::div(a, b).unwrap(), galois_8::div(a, b), "{a} / {b}");
            }
        }
    }
}

#[test]
fn every_nonzero_element_has_an_inverse() {
    for a in 1..=255u8 {
        let i = galois::inv(a).unwrap();
        assert_eq!(galois::mul(a, i), 1, "inverse of {a}");
    }
}

#[test]
fn dividing_by_zero_is_an_error() {
    assert!(matches!(galois::div(7, 0), Err(EccError::DivisionByZero)));
    assert!(matches!(galois::inv(0), Err(EccError::DivisionByZero)));
}

#[test]
fn region_helpers_special_cases() {
    let mut region = vec![3u8, 0, 200, 255];
    galois::mul_region(&mut region, 1);
    assert_eq!(region, vec![3, 0, 200, 255]);
    galois::mul_region(&mut region, 0);
    assert_eq!(region, vec![0; 4]);

    let mut dst = vec![0x0Fu8, 0xF0];
    galois::add_region(&[0xFF, 0xFF], &mut dst);
    assert_eq!(dst, vec![0xF0, 0x0F]);
}

proptest! {
    #[test]
    fn scaling_a_region_is_undone_by_the_inverse(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        factor in 1u8..=255,
    ) {
        let mut region = data.clone();
        galois::mul_region(&mut region, factor);
        for (scaled, orig) in region.iter().zip(&data) {
            prop_assert_eq!(*scaled, galois::mul(*orig, factor));
        }
        galois::mul_region(&mut region, galois::inv(factor).unwrap());
        prop_assert_eq!(region, data);
    }
}

#[test]
fn dispersal_matrix_starts_with_identity() {
    for (rows, cols) in [(6, 4), (3, 3), (31 + 31, 31), (2, 1)] {
        let m = dispersal_matrix(rows, cols).unwrap();
        assert_eq!((m.rows(), m.cols()), (rows, cols));
        for i in 0..cols {
            for j in 0..cols {
                assert_eq!(m.get(i, j), u8::from(i == j), "{rows}x{cols} at ({i},{j})");
            }
        }
    }
}

#[test]
fn dispersal_matrix_rejects_bad_shapes() {
    assert!(dispersal_matrix(3, 0).is_err());
    assert!(dispersal_matrix(3, 4).is_err());
    assert!(dispersal_matrix(256, 4).is_err());
}

fn subsets(n: usize, k: usize) -> Vec<Vec<bool>> {
    (0u32..1 << n)
        .filter(|mask| mask.count_ones() as usize == k)
        .map(|mask| (0..n).map(|i| mask & (1 << i) != 0).collect())
        .collect()
}

#[test]
fn every_choice_of_surviving_rows_inverts() {
    let (rows, cols) = (8, 4);
    let vdm = dispersal_matrix(rows, cols).unwrap();
    let identity = Matrix::identity(cols);
    for exists in subsets(rows, cols) {
        let cm = condense(&vdm, &exists).unwrap();
        let inv = invert(&cm.matrix).unwrap();
        assert_eq!(cm.matrix.multiply(&inv).unwrap(), identity, "exists={exists:?}");
    }
}

#[test]
fn condense_keeps_data_rows_in_place() {
    let vdm = dispersal_matrix(6, 4).unwrap();
    let exists = [true, false, true, false, true, true];
    let cm = condense(&vdm, &exists).unwrap();
    assert_eq!(cm.row_identities, vec![0, 4, 2, 5]);
    assert_eq!(cm.matrix.row(1), vdm.row(4));
    assert_eq!(cm.matrix.row(3), vdm.row(5));
}

#[test]
fn condense_needs_enough_rows() {
    let vdm = dispersal_matrix(6, 4).unwrap();
    let err = condense(&vdm, &[true, false, false, true, true, false]).unwrap_err();
    assert!(matches!(err, EccError::InsufficientFragments { found: 3, needed: 4 }));
}

#[test]
fn singular_matrix_is_uninvertible() {
    let m = Matrix::from_rows(&[vec![1, 2], vec![1, 2]]).unwrap();
    assert!(matches!(invert(&m), Err(EccError::Uninvertible)));
}
