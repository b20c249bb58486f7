//! Infrastructure adapters for external systems.

pub mod connectors;
pub mod memory;
pub mod sqlite;
