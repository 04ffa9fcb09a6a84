//! CLI subcommands.

pub mod fingerprint;
pub mod master;
pub mod probe;
