//! Subcommand implementations.

pub(crate) mod hook;
pub(crate) mod serve;
pub(crate) mod workers;
