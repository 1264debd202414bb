//! SHA-256 over byte targets.
//!
//! Wraps the fixed-length `plonky2_sha256` circuit. Its message is a vector of
//! bits, MSB-first per byte; each input byte is decomposed and connected to
//! the corresponding eight message bits.

use plonky2::field::extension::Extendable;
use plonky2::hash::hash_types::RichField;
use plonky2::iop::target::Target;
use plonky2::plonk::circuit_builder::CircuitBuilder;
use plonky2_sha256::circuit::{make_circuits, Sha256Targets};

use crate::gadgets::bits::bits_msb_to_bytes;

/// Returns the 32 digest bytes of `message`.
pub fn sha256_bytes<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    message: &[Target],
) -> Vec<Target> {
    let Sha256Targets {
        message: message_bits,
        digest,
    } = make_circuits(builder, (message.len() * 8) as u64);

    for (i, &byte) in message.iter().enumerate() {
        let bits_le = builder.split_le(byte, 8);
        for (j, bit) in bits_le.iter().rev().enumerate() {
            builder.connect(message_bits[i * 8 + j].target, bit.target);
        }
    }

    bits_msb_to_bytes(builder, &digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use plonky2::iop::witness::PartialWitness;
    use plonky2::plonk::circuit_data::CircuitConfig;
    use plonky2::plonk::config::{GenericConfig, PoseidonGoldilocksConfig};
    use sha2::{Digest, Sha256};

    use crate::gadgets::bytes::assert_equal_bytes;
    use crate::gadgets::memory::{add_virtual_bytes, constant_bytes};
    use crate::test_utils::{assert_unsatisfiable, set_bytes};

    const D: usize = 2;
    type Cfg = PoseidonGoldilocksConfig;
    type F = <Cfg as GenericConfig<D>>::F;

    #[test]
    fn test_sha256_matches_reference() -> Result<()> {
        // longer than one block to cover the padding across blocks
        let message = b"eyJhbGciOiJFUzI1NiJ9.eyJpc3MiOiJodHRwczovL2lzc3Vlci5leGFtcGxlIn0";
        let expected = Sha256::digest(message);

        let mut builder = CircuitBuilder::<F, D>::new(CircuitConfig::standard_recursion_config());
        let bytes = add_virtual_bytes(&mut builder, message.len());
        let digest = sha256_bytes(&mut builder, &bytes);
        let want = constant_bytes(&mut builder, &expected);
        assert_equal_bytes(&mut builder, &digest, &want);
        let data = builder.build::<Cfg>();

        let mut pw = PartialWitness::<F>::new();
        set_bytes(&mut pw, &bytes, message)?;
        let proof = data.prove(pw)?;
        data.verify(proof)?;

        let mut tampered = message.to_vec();
        tampered[0] ^= 1;
        let mut pw = PartialWitness::<F>::new();
        set_bytes(&mut pw, &bytes, &tampered)?;
        assert_unsatisfiable(&data, pw);
        Ok(())
    }
}
