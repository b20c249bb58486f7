//! Domain layer for the statelearner engine
//!
//! This module contains the learning data model, the error taxonomy and the
//! ports adapters and strategies implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
