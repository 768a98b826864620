//! Domain layer: peer bookkeeping, fork choice, synchronizer configuration.

pub mod config;
pub mod fork;
pub mod peers;
pub mod report;
