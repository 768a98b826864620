//! # Shared Bus - Event Bus for Inter-Subsystem Communication
//!
//! All cross-subsystem notifications travel through this bus. Subsystems
//! publish domain events and subscribe to the topics they care about;
//! direct calls between subsystem crates are forbidden, the runtime wires
//! request/response seams through ports instead.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Subsystem A  │                    │ Subsystem B  │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! The bus also hosts the [`DedupCache`] used by the peer synchronizer to
//! drop gossip it has already processed.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod dedup;
pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use dedup::DedupCache;
pub use events::{EventFilter, EventTopic, LedgerEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Current protocol version for event bus messages.
pub const PROTOCOL_VERSION: u16 = 1;

/// Maximum events to buffer per subscriber before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Source tag for events emitted by the runtime itself.
pub const SOURCE_RUNTIME: u8 = 0;
