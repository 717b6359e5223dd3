//! AWS-oriented adapters and handlers for the account maintenance Lambdas.
//!
//! Handlers are synchronous and talk to the control plane only through the
//! adapter traits in [`adapters`]; the binaries under `src/bin` implement
//! those traits on top of the AWS SDK clients built once per process.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod telemetry;
