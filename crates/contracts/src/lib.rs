//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the aligner workspace.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - `Timestamp` is a signed microsecond count used for both instants and spans
//! - Timeouts and periods live in the data's own timestamp domain, never wall-clock

mod aligner_config;
mod error;
mod estimator;
mod status;
mod time;

pub use aligner_config::*;
pub use error::*;
pub use estimator::{IdentityEstimator, TimestampEstimator};
pub use status::*;
pub use time::Timestamp;
