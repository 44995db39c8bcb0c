//! # survey-dispatch
//!
//! Postgres-backed assignment engine for survey catalogs.
//!
//! Shared survey elements are handed to exactly one surveyor; recurring
//! (quality-control) elements are handed once to every surveyor. All mutual
//! exclusion is delegated to the store's constraints and transactions, so any
//! number of engine instances can run against the same database.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod telemetry;
