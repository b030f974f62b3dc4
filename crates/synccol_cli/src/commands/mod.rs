//! CLI command implementations.

pub mod check;
pub mod load;
pub mod reset;
