//! CLI command implementations.

pub mod artifact;
pub mod delegate;
pub mod routes;
pub mod train;
