//! # Domain Layer
//!
//! Pure ledger logic with no I/O dependencies.

pub mod chain;
pub mod config;
pub mod rollup;
pub mod validation;
pub mod verify;
