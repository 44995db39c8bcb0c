//! Error types for survey-dispatch.
//!
//! A lost claim race is not an error; see [`crate::db::ledger::ClaimAttempt`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    /// A read returned something the schema invariants rule out.
    /// Reported, never repaired.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
