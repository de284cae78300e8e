//! Domain layer for hivelink
//!
//! Roles, tasks, artifacts and the ports the services depend on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    ArtifactError, BackendError, DelegationError, RoutingError, TaskError, TrainingError,
};
