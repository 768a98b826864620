//! # Shared Types Crate
//!
//! Single source of truth for every type that crosses a subsystem boundary:
//! ledger records (Pages and rollup tiers), validator vocabulary, the
//! canonical byte encoding used for hashing, the error taxonomy, and the
//! `TimeSource` seam.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: records are hashed, signed, stored, and
//!   synchronized by different subsystems; all of them must agree on the
//!   byte-level meaning of a record, so the record types and their hash
//!   computations live here and nowhere else.
//! - **Canonical Bytes**: two nodes that disagree on serialization can never
//!   agree on hashes. `canonical::to_canonical_bytes` is the only encoding
//!   ever fed to the chain hash.
//! - **No Ambient State**: nothing in this crate holds globals; registries,
//!   stores, and clocks are explicit values owned by the subsystems.

pub mod canonical;
pub mod entities;
pub mod errors;
pub mod time;

pub use canonical::{reject_floats, to_canonical_bytes};
pub use entities::*;
pub use errors::*;
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource};
