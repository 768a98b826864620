//! # Signer Subsystem (CL-01)
//!
//! Provides the Ed25519 sign/verify primitives used by every other
//! subsystem of Civic-Ledger.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): Pure cryptographic logic, no I/O
//! - **Ports Layer** (`ports/`): Trait definitions for inbound/outbound interfaces
//! - **Service Layer** (`service.rs`): Wires domain logic to ports
//! - **Adapters** (`adapters/`): Seed keystore backed by the filesystem
//!
//! ## Security Notes
//!
//! - **Custody**: private key material never leaves this crate; other
//!   subsystems see only public keys and signatures
//! - **Strict verification**: verification uses `verify_strict`, rejecting
//!   non-canonical signature encodings
//! - **Untrusted input never panics**: malformed keys or signatures from
//!   outside yield `ValidationError` or `false`, never an abort

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::entities::{BatchVerificationOutcome, VerificationRequest};
pub use domain::keys::{decode_public_key_hex, encode_public_key_hex, SignerKeypair};
pub use domain::signing::{batch_verify, verify};
pub use ports::inbound::SignerApi;
pub use ports::outbound::{KeyStore, KeyStoreError};
pub use service::SigningService;
