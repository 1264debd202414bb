//! Command implementations for the credential proof CLI.

pub mod generate;
pub mod prove;
pub mod revocation;
