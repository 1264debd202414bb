//! Circuit size reporting.

use plonky2::plonk::circuit_data::CommonCircuitData;
use plonky2::plonk::config::{GenericConfig, PoseidonGoldilocksConfig};

const D: usize = 2;
type Cfg = PoseidonGoldilocksConfig;
type F = <Cfg as GenericConfig<D>>::F;

/// Print rows, constraint bound, public inputs and gate types of a built circuit.
pub fn print_circuit_stats(name: &str, common: &CommonCircuitData<F, D>) {
    // upper bound: every row pays for every gate type's constraints
    let total_constraints: usize = common
        .gates
        .iter()
        .map(|gate| gate.0.num_constraints())
        .sum::<usize>()
        * common.degree();

    println!("{} circuit statistics:", name);
    println!("  Rows: 2^{} = {}", common.degree_bits(), common.degree());
    println!("  Constraint bound: {}", total_constraints);
    println!("  Public inputs: {}", common.num_public_inputs);
    println!("  Gate types: {}", common.gates.len());
    for gate in &common.gates {
        log::debug!("  gate {}", gate.0.id());
    }
}
