pub mod input;
pub mod statement;
