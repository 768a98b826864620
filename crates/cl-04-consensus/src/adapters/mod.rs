//! # Adapters Layer
//!
//! Concrete implementations of the outbound ports.

pub mod custody;

pub use custody::{LocalSignerHub, StaticReviewGate};
