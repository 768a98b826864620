//! Domain layer: quorum tally, response verification, configuration.

pub mod collection;
pub mod config;
pub mod errors;
