//! Subcommand implementations

pub mod config;
pub mod export;
pub mod settings;
