//! CLI Tooling
//!
//! Command-line surface for all suitesync operations.

pub mod cli;
