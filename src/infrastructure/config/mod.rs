//! Loading of `.statelearner/config.yaml` with local and environment overrides.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
