//! Errors raised while preparing witness hints, before any circuit is touched.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HintError {
    #[error("input truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("unexpected tag 0x{found:02x} at offset {offset}, expected 0x{expected:02x}")]
    UnexpectedTag { offset: usize, expected: u8, found: u8 },

    #[error("unsupported DER length byte 0x{byte:02x} at offset {offset}")]
    UnsupportedLength { offset: usize, byte: u8 },

    #[error("subject public key is not an uncompressed P-256 point")]
    KeyShape,

    #[error("serial number of {len} bytes exceeds the supported {max}")]
    SerialTooLong { len: usize, max: usize },

    #[error("malformed ECDSA signature: {0}")]
    Signature(String),

    #[error("confirmation claim not found in credential header")]
    MissingClaim,

    #[error("invalid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("{what} is {actual} bytes but the circuit was compiled for {expected}")]
    Capacity {
        what: &'static str,
        actual: usize,
        expected: usize,
    },

    #[error("revocation list has {actual} entries but the circuit scans at most {max}")]
    TooManyEntries { actual: usize, max: usize },
}
