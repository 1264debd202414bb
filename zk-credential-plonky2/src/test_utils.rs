//! Helpers shared by circuit tests.

use std::panic::{catch_unwind, AssertUnwindSafe};

use plonky2::iop::witness::PartialWitness;
use plonky2::plonk::circuit_data::CircuitData;
use plonky2::plonk::config::{GenericConfig, PoseidonGoldilocksConfig};

pub use crate::utils::parsing::set_byte_targets as set_bytes;

const D: usize = 2;
type Cfg = PoseidonGoldilocksConfig;
type F = <Cfg as GenericConfig<D>>::F;

/// Asserts that no valid proof comes out of `pw`.
///
/// Witness generation reports conflicting copy constraints either as an error
/// or as a panic depending on where it trips; both count as rejection. A proof
/// that does get produced must then fail verification.
pub fn assert_unsatisfiable(data: &CircuitData<F, Cfg, D>, pw: PartialWitness<F>) {
    match catch_unwind(AssertUnwindSafe(|| data.prove(pw))) {
        Err(_) | Ok(Err(_)) => {}
        Ok(Ok(proof)) => assert!(
            data.verify(proof).is_err(),
            "unsatisfiable witness produced a verifying proof"
        ),
    }
}
