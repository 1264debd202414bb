//! Bit decomposition and comparison helpers shared by the byte gadgets.
//!
//! Constant comparisons work on MSB-first decompositions; variable comparisons
//! shift the difference into a fixed bit window and read its top bit.

use plonky2::field::extension::Extendable;
use plonky2::hash::hash_types::RichField;
use plonky2::iop::target::{BoolTarget, Target};
use plonky2::plonk::circuit_builder::CircuitBuilder;

/// Bit width reserved for byte offsets inside a buffer.
pub const OFFSET_BITS: usize = 24;

/// Decompose `t` into `nbits` boolean targets, most significant first.
/// Also range-checks `t` to `nbits` bits.
pub fn bits_msb_from_target<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    t: Target,
    nbits: usize,
) -> Vec<BoolTarget> {
    let mut bits = builder.split_le(t, nbits);
    bits.reverse();
    bits
}

/// Returns `c < value(bits_msb)`.
pub fn const_lt<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    c: u64,
    bits_msb: &[BoolTarget],
) -> BoolTarget {
    let n = bits_msb.len();
    let mut eq_prefix = builder._true();
    let mut result = builder._false();
    for (k, &b_k) in bits_msb.iter().enumerate() {
        let c_k_one = ((c >> (n - 1 - k)) & 1) == 1;
        if !c_k_one {
            let t1 = builder.and(eq_prefix, b_k);
            result = builder.or(result, t1);
        }
        let eq_bit = if c_k_one { b_k } else { builder.not(b_k) };
        eq_prefix = builder.and(eq_prefix, eq_bit);
    }
    result
}

/// Returns `value(bits_msb) >= c`.
pub fn ge_const<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    bits_msb: &[BoolTarget],
    c: u64,
) -> BoolTarget {
    if c == 0 {
        builder._true()
    } else {
        const_lt(builder, c - 1, bits_msb)
    }
}

/// Returns `value(bits_msb) <= c`.
pub fn le_const<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    bits_msb: &[BoolTarget],
    c: u64,
) -> BoolTarget {
    let gt_c = const_lt(builder, c, bits_msb);
    builder.not(gt_c)
}

/// Returns `lo <= value(bits_msb) <= hi`.
pub fn in_range_const<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    bits_msb: &[BoolTarget],
    lo: u64,
    hi: u64,
) -> BoolTarget {
    let ge_lo = ge_const(builder, bits_msb, lo);
    let le_hi = le_const(builder, bits_msb, hi);
    builder.and(ge_lo, le_hi)
}

/// Returns `a < b` for two values known to fit in `nbits` bits.
///
/// `b - a - 1 + 2^nbits` lands in `[2^nbits, 2^(nbits+1))` exactly when `a < b`.
pub fn lt_bounded<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    a: Target,
    b: Target,
    nbits: usize,
) -> BoolTarget {
    let shift = builder.constant(F::from_canonical_u64((1u64 << nbits) - 1));
    let diff = builder.sub(b, a);
    let shifted = builder.add(diff, shift);
    let bits = builder.split_le(shifted, nbits + 1);
    bits[nbits]
}

/// Returns `a < b` for two byte targets.
pub fn byte_lt<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    a: Target,
    b: Target,
) -> BoolTarget {
    lt_bounded(builder, a, b, 8)
}

/// Returns `a < b` for two buffer offsets.
pub fn offset_lt<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    a: Target,
    b: Target,
) -> BoolTarget {
    lt_bounded(builder, a, b, OFFSET_BITS)
}

/// Big-endian bytes to `nbytes / 4` little-endian u32 limbs.
pub fn bytes_be_to_u32_limbs_le<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    bytes_be: &[Target],
) -> Vec<Target> {
    assert_eq!(bytes_be.len() % 4, 0);
    let n_limbs = bytes_be.len() / 4;
    let mut limbs = Vec::with_capacity(n_limbs);
    for limb_idx in 0..n_limbs {
        let start = bytes_be.len() - (limb_idx + 1) * 4;
        let mut limb = builder.zero();
        for k in 0..4 {
            let coeff = F::from_canonical_u64(1u64 << (8 * (3 - k)));
            limb = builder.mul_const_add(coeff, bytes_be[start + k], limb);
        }
        limbs.push(limb);
    }
    limbs
}

/// MSB-first bits to bytes, eight bits per byte.
pub fn bits_msb_to_bytes<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    bits: &[BoolTarget],
) -> Vec<Target> {
    assert_eq!(bits.len() % 8, 0);
    bits.chunks(8)
        .map(|chunk| builder.le_sum(chunk.iter().rev()))
        .collect()
}
