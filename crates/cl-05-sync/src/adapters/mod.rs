//! # Adapters Layer
//!
//! Infrastructure implementations of the outbound ports. The production
//! HTTP transport lives in the node runtime; this crate ships the
//! in-process loopback used by multi-node tests and demos.

pub mod loopback;

pub use loopback::{LoopbackHub, LoopbackTransport};
