//! # Validator Registry Subsystem (CL-02)
//!
//! Tracks which identities may co-sign blocks and their lifecycle within
//! elected terms.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): Validator records, eligibility rules,
//!   audit-history replay
//! - **Ports Layer** (`ports/`): `RegistryApi` inbound, `AuditSink` outbound
//! - **Service Layer** (`service.rs`): Wires domain logic to ports
//!
//! ## Audit Trail
//!
//! Validators are never deleted. Every lifecycle transition appends a
//! reasoned, timestamped record to the validator's history and mirrors
//! itself through the `AuditSink` port so the runtime can land it on the
//! ledger as a Page. Historical eligibility questions ("was this validator
//! active when that block finalized?") are answered by replaying the
//! history, never by trusting current status.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export main types
pub use domain::eligibility::EligibilityPolicy;
pub use domain::entities::{
    LifecycleRecord, LifecycleTransition, TermBounds, Validator, ValidatorInfo,
};
pub use domain::errors::RegistryError;
pub use ports::inbound::RegistryApi;
pub use ports::outbound::{AuditSink, AuditSinkError};
pub use service::RegistryService;
