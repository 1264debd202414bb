//! Credential proof generation command.

use anyhow::Result;
use std::{fs, path::Path, time::Instant};

use crate::circuits::credential::build_credential_circuit;
use crate::types::input::CredentialInput;
use crate::utils::circuit_stats::print_circuit_stats;

/// Build the circuit for the input's shape, prove, verify and save the proof.
pub fn generate_credential_proof(input_file: &str, build_dir: &Path) -> Result<()> {
    println!("Loading credential input from: {}", input_file);
    let input_data = fs::read_to_string(input_file)?;
    let input: CredentialInput = serde_json::from_str(&input_data)?;
    let statement = input.to_statement()?;
    let public = statement.public();

    let start = Instant::now();
    let prepared = statement.prepare()?;
    let shape = prepared.shape();
    println!(
        "Statement shape: certificate {} bytes, tbs {} bytes, \
         authority {}, envelope {}, revocation {}",
        shape.certificate_len,
        shape.tbs_len,
        shape.authority,
        shape.envelope.is_some(),
        shape.crl.is_some()
    );

    println!("\nBuilding credential circuit...");
    let build_start = Instant::now();
    let circuit = build_credential_circuit(&shape);
    println!("Credential circuit build time: {:?}", build_start.elapsed());
    print_circuit_stats("Credential", &circuit.data.common);

    println!("\n=== GENERATING CREDENTIAL PROOF ===");
    let proof = circuit.prove(&prepared)?;
    println!("Credential proof size: {} bytes", proof.to_bytes().len());

    println!("Verifying credential proof...");
    let verify_start = Instant::now();
    circuit.verify(proof.clone(), &public)?;
    println!("Credential proof verification time: {:?}", verify_start.elapsed());

    let proof_data = bincode::serialize(&proof)?;
    fs::write(build_dir.join("credential_proof.bin"), &proof_data)?;
    println!("Credential proof saved: {} bytes", proof_data.len());
    println!("Credential total time: {:?}", start.elapsed());

    Ok(())
}
