//! Core data model.
//!
//! A catalog is an ordered set of work items published once. Surveyors claim
//! items; a claim is closed by submitting a payload for it.

pub mod catalog;
pub mod claim;
pub mod payload;

pub use catalog::*;
pub use claim::*;
pub use payload::*;
