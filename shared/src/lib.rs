//! Shared types for the workload deployment test harness
//!
//! Contains the records that cross module boundaries: command results,
//! namespace records, fixture data, the shared error type and logging setup.

pub mod errors;
pub mod fixture;
pub mod logging;
pub mod types;

pub use errors::*;
pub use fixture::Fixture;
pub use types::*;
