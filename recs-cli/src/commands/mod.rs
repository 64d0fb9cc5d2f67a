//! Subcommand implementations.

pub mod ingest;
pub mod optimize;
pub mod recommend;
pub mod search;
pub mod seed;
pub mod similar;
pub mod stats;
