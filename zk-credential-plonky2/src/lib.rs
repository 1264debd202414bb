//! Privacy-preserving credential proofs over plonky2.
//!
//! A holder proves possession of a certified P-256 key, the binding of that
//! key to an issuer-signed credential, and that the certificate is not
//! revoked, without revealing the certificate or the key.

pub mod circuits;
pub mod commands;
pub mod der;
pub mod error;
pub mod fixtures;
pub mod gadgets;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use circuits::credential::{build_credential_circuit, CredentialCircuit, CredentialTargets};
pub use circuits::revocation::{build_revocation_circuit, RevocationCircuit, RevocationTargets};
pub use error::HintError;
pub use types::input::CredentialInput;
pub use types::statement::{
    CredentialPublic, CredentialShape, CredentialStatement, PreparedCredential,
    PreparedRevocation, RevocationShape, RevocationStatement,
};
