//! # Domain Layer
//!
//! Validator records and eligibility rules, no I/O.

pub mod eligibility;
pub mod entities;
pub mod errors;
