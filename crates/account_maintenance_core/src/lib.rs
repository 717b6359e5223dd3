//! Provider-free domain primitives for the account maintenance Lambdas.
//!
//! This crate owns retention cutoffs, fleet selection, word-count records,
//! pagination and the response contracts. It intentionally excludes AWS SDK
//! and Lambda runtime concerns, which live in `account_maintenance_lambda`.

pub mod aggregate;
pub mod contract;
pub mod error;
pub mod fleet;
pub mod pagination;
pub mod retention;
