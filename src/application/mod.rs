//! Application layer: the per-run step controller and the registry that
//! admits, stops and reports runs.

pub mod run_registry;
pub mod step_controller;

pub use run_registry::{RunHandle, RunRegistry};
pub use step_controller::{ControllerExit, RunMode, RunPlan, RunProgress, StepController};

/// Cooperative stop request shared between the registry and a running controller.
pub use tokio_util::sync::CancellationToken;
