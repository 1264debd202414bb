//! Base64url and hex decoding of ASCII byte targets.
//!
//! Both decoders assert every input character belongs to the alphabet and
//! return the decoded bytes. There is no padding: a trailing group of two or
//! three base64url characters yields one or two bytes.

use plonky2::field::extension::Extendable;
use plonky2::hash::hash_types::RichField;
use plonky2::iop::target::{BoolTarget, Target};
use plonky2::plonk::circuit_builder::CircuitBuilder;

use crate::gadgets::bits::{bits_msb_from_target, in_range_const};

pub const BASE64URL_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Number of bytes `n` unpadded base64url characters decode to.
pub fn base64url_decoded_len(n: usize) -> usize {
    assert_ne!(n % 4, 1, "a single trailing base64url character encodes no byte");
    n / 4 * 3 + (n % 4).saturating_sub(1)
}

/// Six-bit value of a base64url character, looked up by equality against the alphabet.
fn base64url_sextet<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    ascii: Target,
) -> Vec<BoolTarget> {
    let mut hits = builder.zero();
    let mut value = builder.zero();
    for (k, &symbol) in BASE64URL_ALPHABET.iter().enumerate() {
        let c = builder.constant(F::from_canonical_u8(symbol));
        let eq = builder.is_equal(ascii, c);
        hits = builder.add(hits, eq.target);
        value = builder.mul_const_add(F::from_canonical_usize(k), eq.target, value);
    }
    builder.assert_one(hits);
    builder.split_le(value, 6)
}

pub fn decode_base64url<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    chars: &[Target],
) -> Vec<Target> {
    let mut out = Vec::with_capacity(base64url_decoded_len(chars.len()));
    for group in chars.chunks(4) {
        let v: Vec<Vec<BoolTarget>> = group
            .iter()
            .map(|&c| base64url_sextet(builder, c))
            .collect();

        // b0 = v0 << 2 | v1 >> 4
        let b0_bits = [v[1][4], v[1][5], v[0][0], v[0][1], v[0][2], v[0][3], v[0][4], v[0][5]];
        out.push(builder.le_sum(b0_bits.iter()));
        if v.len() > 2 {
            // b1 = (v1 & 0x0f) << 4 | v2 >> 2
            let b1_bits = [v[2][2], v[2][3], v[2][4], v[2][5], v[1][0], v[1][1], v[1][2], v[1][3]];
            out.push(builder.le_sum(b1_bits.iter()));
        }
        if v.len() > 3 {
            // b2 = (v2 & 0x03) << 6 | v3
            let b2_bits = [v[3][0], v[3][1], v[3][2], v[3][3], v[3][4], v[3][5], v[2][0], v[2][1]];
            out.push(builder.le_sum(b2_bits.iter()));
        }
    }
    out
}

/// Value of a hex digit in `0-9`, `a-f` or `A-F`.
fn hex_nibble<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    ascii: Target,
) -> Target {
    let bits = bits_msb_from_target(builder, ascii, 8);
    let is_digit = in_range_const(builder, &bits, b'0' as u64, b'9' as u64);
    let is_lower = in_range_const(builder, &bits, b'a' as u64, b'f' as u64);
    let is_upper = in_range_const(builder, &bits, b'A' as u64, b'F' as u64);

    let classes = builder.add(is_digit.target, is_lower.target);
    let classes = builder.add(classes, is_upper.target);
    builder.assert_one(classes);

    let mut nibble = builder.zero();
    for (class, base) in [
        (is_digit, b'0' as u64),
        (is_lower, b'a' as u64 - 10),
        (is_upper, b'A' as u64 - 10),
    ] {
        let c = builder.constant(F::from_canonical_u64(base));
        let value = builder.sub(ascii, c);
        nibble = builder.mul_add(class.target, value, nibble);
    }
    nibble
}

pub fn decode_hex<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    chars: &[Target],
) -> Vec<Target> {
    assert_eq!(chars.len() % 2, 0, "hex input must have an even length");
    chars
        .chunks(2)
        .map(|pair| {
            let hi = hex_nibble(builder, pair[0]);
            let lo = hex_nibble(builder, pair[1]);
            builder.mul_const_add(F::from_canonical_u64(16), hi, lo)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use plonky2::iop::witness::PartialWitness;
    use plonky2::plonk::circuit_data::CircuitConfig;
    use plonky2::plonk::config::{GenericConfig, PoseidonGoldilocksConfig};

    use crate::gadgets::bytes::assert_equal_bytes;
    use crate::gadgets::memory::{add_virtual_bytes, constant_bytes};
    use crate::test_utils::{assert_unsatisfiable, set_bytes};

    const D: usize = 2;
    type Cfg = PoseidonGoldilocksConfig;
    type F = <Cfg as GenericConfig<D>>::F;

    /// Proves that `encoded` decodes to `expected` with the given decoder.
    fn check_decode(
        encoded: &[u8],
        expected: &[u8],
        decode: fn(&mut CircuitBuilder<F, D>, &[Target]) -> Vec<Target>,
    ) -> Result<bool> {
        let mut builder = CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
        let chars = add_virtual_bytes(&mut builder, encoded.len());
        let decoded = decode(&mut builder, &chars);
        let want = constant_bytes(&mut builder, expected);
        assert_equal_bytes(&mut builder, &decoded, &want);
        let data = builder.build::<Cfg>();

        let mut pw = PartialWitness::<F>::new();
        set_bytes(&mut pw, &chars, encoded)?;
        match data.prove(pw) {
            Ok(proof) => Ok(data.verify(proof).is_ok()),
            Err(_) => Ok(false),
        }
    }

    #[test]
    fn test_base64url_round_trip() -> Result<()> {
        let samples: [&[u8]; 4] = [
            b"{\"alg\":\"ES256\"}",
            b"\xfb\xff\xbf\x00\x01",
            b"ab",
            &[0xff; 33],
        ];
        for bytes in samples {
            let encoded = URL_SAFE_NO_PAD.encode(bytes);
            assert_eq!(base64url_decoded_len(encoded.len()), bytes.len());
            assert!(check_decode(encoded.as_bytes(), bytes, decode_base64url)?);
        }
        Ok(())
    }

    #[test]
    fn test_base64url_rejects_foreign_characters() -> Result<()> {
        for encoded in [b"ab+d".as_slice(), b"ab/d", b"abc="] {
            let mut builder =
                CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
            let chars = add_virtual_bytes(&mut builder, encoded.len());
            decode_base64url(&mut builder, &chars);
            let data = builder.build::<Cfg>();
            let mut pw = PartialWitness::<F>::new();
            set_bytes(&mut pw, &chars, encoded)?;
            assert_unsatisfiable(&data, pw);
        }
        Ok(())
    }

    #[test]
    fn test_hex_round_trip() -> Result<()> {
        let bytes = [0x00, 0x09, 0x0a, 0x7f, 0x80, 0xab, 0xcd, 0xff];
        assert!(check_decode(hex::encode(bytes).as_bytes(), &bytes, decode_hex)?);
        assert!(check_decode(hex::encode_upper(bytes).as_bytes(), &bytes, decode_hex)?);
        Ok(())
    }

    #[test]
    fn test_hex_rejects_non_digits() -> Result<()> {
        for encoded in [b"0g", b"G0", b"/0", b":0"] {
            let mut builder =
                CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
            let chars = add_virtual_bytes(&mut builder, 2);
            decode_hex(&mut builder, &chars);
            let data = builder.build::<Cfg>();
            let mut pw = PartialWitness::<F>::new();
            set_bytes(&mut pw, &chars, encoded)?;
            assert_unsatisfiable(&data, pw);
        }
        Ok(())
    }
}
