//! # Adapters Module
//!
//! Infrastructure adapters implementing the ports.

pub mod audit;

pub use audit::InMemoryAuditSink;
