use std::{fs, path::Path, path::PathBuf};
use clap::Parser;
use anyhow::Result;
use env_logger::Env;

use zk_credential::commands::generate::generate_input;
use zk_credential::commands::prove::generate_credential_proof;
use zk_credential::commands::revocation::generate_revocation_proof;

/// Command-line arguments for the credential proof generator
#[derive(Parser)]
#[command(name = "zk-credential")]
#[command(about = "Prove possession and validity of a certified credential key")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, default_value = "build", help = "Output directory for artifacts")]
    output_dir: String,
}

#[derive(Parser)]
enum Commands {
    /// Write a sample input document with fresh keys, certificate, revocation list and credential
    Generate {
        #[arg(long, default_value_t = 12345, help = "Serial number of the holder certificate")]
        serial: u64,
        #[arg(long, value_delimiter = ',', help = "Revoked serial numbers, comma separated")]
        revoked: Vec<u64>,
        #[arg(
            long,
            default_value = "inputs/credential.json",
            help = "Path of the generated document"
        )]
        output: PathBuf,
    },
    /// Build the credential circuit for an input document and generate a proof
    Prove {
        #[arg(short, long, help = "Input JSON file with the credential statement")]
        input: String,
    },
    /// Prove that the input certificate is absent from the input revocation list
    Revocation {
        #[arg(short, long, help = "Input JSON file with certificate and revocation list")]
        input: String,
        #[arg(long, help = "Number of revocation entries the circuit scans")]
        max_entries: Option<usize>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    use std::time::Instant;

    println!("=== ZK-CREDENTIAL PLONKY2 PROOF SYSTEM ===");
    let total_start = Instant::now();

    let build_dir = Path::new(&args.output_dir);
    if !build_dir.exists() {
        fs::create_dir_all(build_dir)?;
    }

    match args.command {
        Some(Commands::Generate { serial, revoked, output }) => {
            generate_input(serial, &revoked, &output)?;
        }
        Some(Commands::Prove { input }) => {
            generate_credential_proof(&input, build_dir)?;
        }
        Some(Commands::Revocation { input, max_entries }) => {
            generate_revocation_proof(&input, max_entries, build_dir)?;
        }
        None => {
            println!("\nNo command specified. Available commands:");
            println!("  cargo run --release --bin zk-credential -- generate \
                      --serial 12345 --revoked 1111,2222");
            println!("  cargo run --release --bin zk-credential -- prove \
                      --input inputs/credential.json");
            println!("  cargo run --release --bin zk-credential -- revocation \
                      --input inputs/credential.json --max-entries 8");
            return Ok(());
        }
    }

    println!("\nTotal execution time: {:?}", total_start.elapsed());
    println!("Artifacts saved to: {}", build_dir.display());
    println!("=== EXECUTION COMPLETE ===");

    Ok(())
}
