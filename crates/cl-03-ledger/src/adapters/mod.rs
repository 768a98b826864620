//! # Adapters Layer
//!
//! Infrastructure implementations of the outbound ports.

pub mod file;
pub mod lock;
pub mod memory;

pub use file::{FilePageStore, FileRollupStore};
pub use lock::StoreLock;
pub use memory::{InMemoryPageStore, InMemoryRollupStore};
