//! Byte-indexed memory over a fixed-size buffer of circuit bytes.
//!
//! A read at a witness-dependent index is a linear scan: every position is
//! compared to the index and the matching byte is summed in. Cost is one
//! equality check per buffer position per read, so buffer sizes are bounded
//! by the compiled circuit shape.
//!
//! An index outside `0..buffer.len()` selects nothing and reads as zero. Use
//! [`assert_index_in_bounds`] before relying on a read where zero is a
//! meaningful value.

use plonky2::field::extension::Extendable;
use plonky2::hash::hash_types::RichField;
use plonky2::iop::target::Target;
use plonky2::plonk::circuit_builder::CircuitBuilder;

use crate::gadgets::bits::OFFSET_BITS;

/// Allocate `n` private byte targets, each range-checked to 8 bits.
pub fn add_virtual_bytes<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    n: usize,
) -> Vec<Target> {
    (0..n)
        .map(|_| {
            let t = builder.add_virtual_target();
            builder.range_check(t, 8);
            t
        })
        .collect()
}

/// Constant byte targets for a compile-time byte string.
pub fn constant_bytes<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    bytes: &[u8],
) -> Vec<Target> {
    bytes
        .iter()
        .map(|&b| builder.constant(F::from_canonical_u8(b)))
        .collect()
}

/// Returns `buffer[index]`, or zero when `index` is out of range.
pub fn read_at<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    buffer: &[Target],
    index: Target,
) -> Target {
    let mut acc = builder.zero();
    for (i, &byte) in buffer.iter().enumerate() {
        let c_i = builder.constant(F::from_canonical_usize(i));
        let eq = builder.is_equal(index, c_i);
        acc = builder.mul_add(eq.target, byte, acc);
    }
    acc
}

/// Returns `buffer[offset + delta]` for a constant `delta`.
pub fn read_at_offset<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    buffer: &[Target],
    offset: Target,
    delta: usize,
) -> Target {
    let index = builder.add_const(offset, F::from_canonical_usize(delta));
    read_at(builder, buffer, index)
}

/// Asserts `buffer[offset + p] == window[p]` for every `p`.
pub fn assert_window_equals<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    buffer: &[Target],
    window: &[Target],
    offset: Target,
) {
    assert!(window.len() <= buffer.len(), "window larger than buffer");
    if let Some(last) = window.len().checked_sub(1) {
        let end = builder.add_const(offset, F::from_canonical_usize(last));
        assert_index_in_bounds(builder, end, buffer.len());
    }
    for (p, &expected) in window.iter().enumerate() {
        let byte = read_at_offset(builder, buffer, offset, p);
        builder.connect(byte, expected);
    }
}

/// Asserts `index < len`.
pub fn assert_index_in_bounds<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    index: Target,
    len: usize,
) {
    assert!(len > 0 && len < (1 << OFFSET_BITS));
    // len - 1 - index wraps to a huge field element when index >= len
    let last = builder.constant(F::from_canonical_usize(len - 1));
    let slack = builder.sub(last, index);
    builder.range_check(slack, OFFSET_BITS);
}
