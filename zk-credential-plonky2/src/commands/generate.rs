//! Sample input generation.

use anyhow::Result;
use std::{fs, path::Path};

use crate::fixtures::Scenario;
use crate::types::input::CredentialInput;

/// Write a self-consistent credential document for a fresh holder to `output`.
pub fn generate_input(serial: u64, revoked: &[u64], output: &Path) -> Result<()> {
    println!("Generating holder certificate with serial {}...", serial);
    let scenario = Scenario::new(serial, revoked)?;
    let input = CredentialInput::from_scenario(&scenario)?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, serde_json::to_string_pretty(&input)?)?;

    println!("Certificate: {} bytes", scenario.certificate.len());
    println!("Revocation list: {} bytes, {} entries", scenario.crl.len(), revoked.len());
    if revoked.contains(&serial) {
        println!("Note: serial {} is revoked, proving will fail", serial);
    }
    println!("Input written to: {}", output.display());
    Ok(())
}
