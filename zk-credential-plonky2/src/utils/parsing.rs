//! Parsing and witness conversion for keys, signatures and byte buffers.

use anyhow::{anyhow, Context, Result};
use num_bigint::BigUint;
use plonky2::field::types::Field;
use plonky2::iop::target::Target;
use plonky2::iop::witness::{PartialWitness, WitnessWrite};
use plonky2::plonk::config::{GenericConfig, PoseidonGoldilocksConfig};
use plonky2_ecdsa::curve::p256::P256;
use plonky2_ecdsa::gadgets::biguint::WitnessBigUint;
use plonky2_ecdsa::gadgets::curve::AffinePointTarget;
use plonky2_ecdsa::gadgets::ecdsa::ECDSASignatureTarget;

use crate::types::statement::{EcdsaSignature, PublicKey};

const D: usize = 2;
type Cfg = PoseidonGoldilocksConfig;
type F = <Cfg as GenericConfig<D>>::F;

/// Decode a hex string (with or without 0x prefix).
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    let hex_clean = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_clean).with_context(|| format!("invalid hex string {hex_str:?}"))
}

/// Decode a hex string into exactly 32 bytes, left-padding shorter values.
pub fn hex_to_bytes32(hex_str: &str) -> Result<[u8; 32]> {
    let bytes = hex_to_bytes(hex_str)?;
    if bytes.len() > 32 {
        return Err(anyhow!("value {hex_str:?} is longer than 32 bytes"));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// 32 big-endian bytes as 8 little-endian u32 limbs.
pub fn bytes32_to_u32_limbs_le(bytes: &[u8; 32]) -> [u32; 8] {
    let mut limbs = [0u32; 8];
    for (limb_idx, limb) in limbs.iter_mut().enumerate() {
        let start = 32 - (limb_idx + 1) * 4;
        *limb = u32::from_be_bytes([
            bytes[start],
            bytes[start + 1],
            bytes[start + 2],
            bytes[start + 3],
        ]);
    }
    limbs
}

/// Public-input encoding of a key: x limbs then y limbs.
pub fn public_key_limbs(pk: &PublicKey) -> Vec<F> {
    bytes32_to_u32_limbs_le(&pk.x)
        .into_iter()
        .chain(bytes32_to_u32_limbs_le(&pk.y))
        .map(|limb| F::from_canonical_u32(limb))
        .collect()
}

pub fn bytes_to_field_elements(bytes: &[u8]) -> Vec<F> {
    bytes.iter().map(|&b| F::from_canonical_u8(b)).collect()
}

/// Assigns `bytes` to `targets`, zero padding the tail.
pub fn set_byte_targets(
    pw: &mut PartialWitness<F>,
    targets: &[Target],
    bytes: &[u8],
) -> Result<()> {
    if bytes.len() > targets.len() {
        return Err(anyhow!(
            "{} bytes do not fit {} byte targets",
            bytes.len(),
            targets.len()
        ));
    }
    for (i, &t) in targets.iter().enumerate() {
        let byte = bytes.get(i).copied().unwrap_or(0);
        pw.set_target(t, F::from_canonical_u8(byte))?;
    }
    Ok(())
}

pub fn set_public_key_target(
    pw: &mut PartialWitness<F>,
    target: &AffinePointTarget<P256>,
    pk: &PublicKey,
) -> Result<()> {
    pw.set_biguint_target(&target.x.value, &BigUint::from_bytes_be(&pk.x))?;
    pw.set_biguint_target(&target.y.value, &BigUint::from_bytes_be(&pk.y))?;
    Ok(())
}

pub fn set_signature_target(
    pw: &mut PartialWitness<F>,
    target: &ECDSASignatureTarget<P256>,
    sig: &EcdsaSignature,
) -> Result<()> {
    pw.set_biguint_target(&target.r.value, &BigUint::from_bytes_be(&sig.r))?;
    pw.set_biguint_target(&target.s.value, &BigUint::from_bytes_be(&sig.s))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_bytes32_pads_and_rejects() -> Result<()> {
        let value = hex_to_bytes32("0x0102")?;
        assert_eq!(value[30..], [1, 2]);
        assert!(value[..30].iter().all(|&b| b == 0));
        assert!(hex_to_bytes32(&"11".repeat(33)).is_err());
        assert!(hex_to_bytes("0xzz").is_err());
        Ok(())
    }

    #[test]
    fn test_limbs_are_little_endian() {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        bytes[0] = 0x80;
        let limbs = bytes32_to_u32_limbs_le(&bytes);
        assert_eq!(limbs[0], 1);
        assert_eq!(limbs[7], 0x8000_0000);
    }
}
