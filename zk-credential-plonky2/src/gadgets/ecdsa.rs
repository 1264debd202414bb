//! Hash-then-verify ECDSA over P-256 and binding of raw key bytes to
//! non-native key coordinates.

use plonky2::field::extension::Extendable;
use plonky2::hash::hash_types::RichField;
use plonky2::iop::target::Target;
use plonky2::plonk::circuit_builder::CircuitBuilder;
use plonky2_ecdsa::curve::p256::P256;
use plonky2_ecdsa::field::p256_scalar::P256Scalar;
use plonky2_ecdsa::gadgets::biguint::BigUintTarget;
use plonky2_ecdsa::gadgets::curve::{AffinePointTarget, CircuitBuilderCurve};
use plonky2_ecdsa::gadgets::ecdsa::{
    verify_p256_message_circuit, ECDSAPublicKeyTarget, ECDSASignatureTarget,
};
use plonky2_ecdsa::gadgets::nonnative::{CircuitBuilderNonNative, NonNativeTarget};

use crate::gadgets::bits::bytes_be_to_u32_limbs_le;
use crate::gadgets::sha256::sha256_bytes;

pub fn add_virtual_public_key<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
) -> AffinePointTarget<P256> {
    builder.add_virtual_affine_point_target::<P256>()
}

pub fn add_virtual_signature<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
) -> ECDSASignatureTarget<P256> {
    let r = builder.add_virtual_nonnative_target::<P256Scalar>();
    let s = builder.add_virtual_nonnative_target::<P256Scalar>();
    ECDSASignatureTarget { r, s }
}

/// Registers both coordinates limb by limb, `x` first.
pub fn register_public_key<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    pk: &AffinePointTarget<P256>,
) {
    for limb in pk.x.value.limbs.iter().chain(pk.y.value.limbs.iter()) {
        builder.register_public_input(limb.0);
    }
}

/// Interprets 32 big-endian digest bytes as an integer and reduces it modulo
/// the P-256 group order.
pub fn digest_to_scalar<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    digest: &[Target],
) -> NonNativeTarget<P256Scalar> {
    assert_eq!(digest.len(), 32);
    let limbs = bytes_be_to_u32_limbs_le(builder, digest);
    let big = BigUintTarget::from_target_vec(&limbs);
    builder.reduce::<P256Scalar>(&big)
}

/// ES256: verifies `sig` over SHA-256(`message`) under `pk`.
pub fn verify_ecdsa<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    message: &[Target],
    pk: &AffinePointTarget<P256>,
    sig: &ECDSASignatureTarget<P256>,
) {
    let digest = sha256_bytes(builder, message);
    let msg = digest_to_scalar(builder, &digest);
    verify_p256_message_circuit(builder, msg, sig.clone(), ECDSAPublicKeyTarget(pk.clone()));
}

/// Verifies a JWS-style signature over `header_b64 '.' payload_b64`.
pub fn verify_jws_like<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    header_b64: &[Target],
    payload_b64: &[Target],
    pk: &AffinePointTarget<P256>,
    sig: &ECDSASignatureTarget<P256>,
) {
    let dot = builder.constant(F::from_canonical_u8(b'.'));
    let mut message = Vec::with_capacity(header_b64.len() + 1 + payload_b64.len());
    message.extend_from_slice(header_b64);
    message.push(dot);
    message.extend_from_slice(payload_b64);
    verify_ecdsa(builder, &message, pk, sig);
}

/// Asserts that `X || Y` (64 big-endian bytes) are exactly the limbs of `pk`,
/// and that `pk` is on the curve.
pub fn connect_key_bytes<F: RichField + Extendable<D>, const D: usize>(
    builder: &mut CircuitBuilder<F, D>,
    key_bytes: &[Target],
    pk: &AffinePointTarget<P256>,
) {
    assert_eq!(key_bytes.len(), 64);
    let x_limbs = bytes_be_to_u32_limbs_le(builder, &key_bytes[..32]);
    let y_limbs = bytes_be_to_u32_limbs_le(builder, &key_bytes[32..]);
    for (coordinate, limbs) in [(&pk.x, x_limbs), (&pk.y, y_limbs)] {
        assert_eq!(coordinate.value.limbs.len(), limbs.len());
        for (limb, &t) in coordinate.value.limbs.iter().zip(&limbs) {
            builder.connect(limb.0, t);
        }
    }
    builder.curve_assert_valid(pk);
}
