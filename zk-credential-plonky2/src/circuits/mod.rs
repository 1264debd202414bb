//! Composed proof circuits.

pub mod credential;
pub mod revocation;

use anyhow::{bail, Result};
use plonky2::plonk::circuit_data::CircuitConfig;
use plonky2::plonk::config::{GenericConfig, PoseidonGoldilocksConfig};
use plonky2::plonk::proof::ProofWithPublicInputs;

const D: usize = 2;
type Cfg = PoseidonGoldilocksConfig;
type F = <Cfg as GenericConfig<D>>::F;

/// ECC-sized rows with zero knowledge, shared by every composed circuit.
pub fn circuit_config() -> CircuitConfig {
    let mut config = CircuitConfig::standard_ecc_config();
    config.zero_knowledge = true;
    config
}

/// Fails unless `proof` carries exactly `expected` as public inputs.
pub fn check_public_inputs(
    proof: &ProofWithPublicInputs<F, Cfg, D>,
    expected: &[F],
) -> Result<()> {
    if proof.public_inputs.len() != expected.len() {
        bail!(
            "proof has {} public inputs, statement expects {}",
            proof.public_inputs.len(),
            expected.len()
        );
    }
    if let Some(i) = proof
        .public_inputs
        .iter()
        .zip(expected)
        .position(|(got, want)| got != want)
    {
        bail!("public input {} does not match the statement", i);
    }
    Ok(())
}
