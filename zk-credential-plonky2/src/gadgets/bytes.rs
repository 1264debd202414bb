//! Predicates over fixed-length byte arrays.

use plonky2::field::extension::Extendable;
use plonky2::hash::hash_types::RichField;
use plonky2::iop::target::{BoolTarget, Target};
use plonky2::plonk::circuit_builder::CircuitBuilder;

use crate::gadgets::bits::byte_lt;

/// Asserts `a == b` position by position.
pub fn assert_equal_bytes<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    a: &[Target],
    b: &[Target],
) {
    assert_eq!(a.len(), b.len(), "byte arrays differ in length");
    for (&x, &y) in a.iter().zip(b) {
        builder.connect(x, y);
    }
}

/// Returns `a == b`.
pub fn equal_bytes<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    a: &[Target],
    b: &[Target],
) -> BoolTarget {
    assert_eq!(a.len(), b.len(), "byte arrays differ in length");
    let mut all_eq = builder._true();
    for (&x, &y) in a.iter().zip(b) {
        let eq = builder.is_equal(x, y);
        all_eq = builder.and(all_eq, eq);
    }
    all_eq
}

/// Asserts `haystack[offset..offset + needle.len()] == needle`.
///
/// Every haystack position checks whether it falls inside the window and, if
/// so, matches the corresponding needle byte. The number of covered
/// positions must equal the needle length, so a window running past the end
/// of the haystack is rejected.
pub fn assert_subset_at<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    haystack: &[Target],
    needle: &[Target],
    offset: Target,
) {
    assert!(needle.len() <= haystack.len(), "needle longer than haystack");
    let mut matched = builder.zero();
    for (i, &h) in haystack.iter().enumerate() {
        let c_i = builder.constant(F::from_canonical_usize(i));
        let rel = builder.sub(c_i, offset);

        let mut in_window = builder.zero();
        let mut selected = builder.zero();
        for (p, &n) in needle.iter().enumerate() {
            let c_p = builder.constant(F::from_canonical_usize(p));
            let eq = builder.is_equal(rel, c_p);
            in_window = builder.add(in_window, eq.target);
            selected = builder.mul_add(eq.target, n, selected);
        }

        let diff = builder.sub(h, selected);
        let gated = builder.mul(in_window, diff);
        builder.assert_zero(gated);
        matched = builder.add(matched, in_window);
    }
    let expected = builder.constant(F::from_canonical_usize(needle.len()));
    builder.connect(matched, expected);
}

/// Lexicographic `a < b`: the first differing byte decides.
pub fn is_smaller<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    a: &[Target],
    b: &[Target],
) -> BoolTarget {
    assert_eq!(a.len(), b.len(), "byte arrays differ in length");
    let mut found = builder._false();
    let mut result = builder._false();
    for (&x, &y) in a.iter().zip(b) {
        let lt = byte_lt(builder, x, y);
        let eq = builder.is_equal(x, y);
        let differs = builder.not(eq);
        let not_found = builder.not(found);
        let first = builder.and(not_found, differs);
        result = BoolTarget::new_unsafe(builder.select(first, lt.target, result.target));
        found = builder.or(found, differs);
    }
    result
}

/// Lexicographic `a > b`.
pub fn is_greater<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    a: &[Target],
    b: &[Target],
) -> BoolTarget {
    is_smaller(builder, b, a)
}
