//! # Adapters Module
//!
//! Infrastructure adapters implementing the ports.

pub mod keystore;

pub use keystore::FileSeedStore;
