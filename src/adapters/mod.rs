//! Infrastructure adapters for external systems.

pub mod events;
pub mod sqlite;
pub mod store;
pub mod substrates;
