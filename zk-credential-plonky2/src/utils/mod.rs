//! Witness conversion and circuit reporting helpers.

pub mod circuit_stats;
pub mod parsing;
