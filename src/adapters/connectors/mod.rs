//! Symbol connector adapters.

pub mod scripted;

pub use scripted::{MealyTarget, ScriptedConnectorFactory, ScriptedMealy, TargetEdge};
