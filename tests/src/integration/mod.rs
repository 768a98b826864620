//! Cross-subsystem integration flows.

pub mod harness;

mod audit_trail;
mod cold_start;
mod fork_convergence;
mod quorum_flows;
