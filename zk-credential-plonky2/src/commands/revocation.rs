//! Standalone not-revoked proof command.

use anyhow::Result;
use std::{fs, path::Path, time::Instant};

use crate::circuits::revocation::build_revocation_circuit;
use crate::types::input::CredentialInput;
use crate::utils::circuit_stats::print_circuit_stats;

pub fn generate_revocation_proof(
    input_file: &str,
    max_entries: Option<usize>,
    build_dir: &Path,
) -> Result<()> {
    println!("Loading revocation input from: {}", input_file);
    let input_data = fs::read_to_string(input_file)?;
    let input: CredentialInput = serde_json::from_str(&input_data)?;

    let start = Instant::now();
    let prepared = input.to_revocation_statement()?.prepare()?;
    let mut shape = prepared.shape();
    if let Some(max_entries) = max_entries {
        shape.max_entries = max_entries;
    }
    println!(
        "Revocation list: {} bytes, {} entries, scanning {}",
        shape.crl_len,
        prepared.crl.revoked_serials.len(),
        shape.max_entries
    );

    let build_start = Instant::now();
    let circuit = build_revocation_circuit(&shape);
    println!("Revocation circuit build time: {:?}", build_start.elapsed());
    print_circuit_stats("Revocation", &circuit.data.common);

    println!("\n=== GENERATING REVOCATION PROOF ===");
    let proof = circuit.prove(&prepared)?;

    let verify_start = Instant::now();
    circuit.verify(proof.clone(), &prepared.statement.crl)?;
    println!("Revocation proof verification time: {:?}", verify_start.elapsed());

    let proof_data = bincode::serialize(&proof)?;
    fs::write(build_dir.join("revocation_proof.bin"), &proof_data)?;
    println!("Revocation proof saved: {} bytes", proof_data.len());
    println!("Revocation total time: {:?}", start.elapsed());

    Ok(())
}
