//! Domain models for the propagation report

mod condition;
mod observation;
mod raw;

pub use condition::*;
pub use observation::*;
pub use raw::*;
