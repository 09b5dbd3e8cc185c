//! Shared types and models for the propagation report pipeline
//!
//! This crate holds the normalised domain model, the raw upstream record
//! types, and the pure helpers (time parsing, folder paths, invariant checks)
//! used by the backend and its tests.

pub mod models;
pub mod time;
pub mod types;
pub mod validation;

pub use models::*;
pub use time::*;
pub use types::*;
pub use validation::*;
