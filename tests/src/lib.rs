//! # Civic-Ledger Test Suite
//!
//! Unified test crate for flows that cross subsystem boundaries. Each
//! subsystem crate tests its own logic against scripted ports; the tests
//! here wire the real services together instead, the way the runtime
//! does, and drive whole civic scenarios through them.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs          # Full in-process node fixtures
//!     ├── quorum_flows.rs     # Signature collection outcomes end to end
//!     ├── audit_trail.rs      # Registry lifecycle as chain history
//!     ├── fork_convergence.rs # Partition and reconvergence over loopback
//!     └── cold_start.rs       # Disk-backed chains across restarts
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p cl-tests
//!
//! # One flow
//! cargo test -p cl-tests integration::fork_convergence
//! ```

pub mod integration;
