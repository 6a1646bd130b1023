//! CLI command implementations.

pub mod config;
pub mod nodes;
pub mod run;
