//! Reusable constraint-system gadgets over byte targets.
//!
//! Every byte is a field element range-checked to 8 bits. Offsets into a
//! buffer are field elements below `2^OFFSET_BITS`.

pub mod bits;
pub mod bytes;
pub mod codec;
pub mod der;
pub mod ecdsa;
pub mod memory;
pub mod sha256;
