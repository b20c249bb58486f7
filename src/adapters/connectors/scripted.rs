//! Table-driven Mealy target used as a stand-in system under learning.
//!
//! A target file describes states, their transitions and outputs:
//!
//! ```yaml
//! reset_symbol: reset
//! initial: s0
//! states:
//!   s0:
//!     a: { output: ok, target: s1 }
//!     b: { output: s0, target: s0 }
//!   s1:
//!     a: { output: ok, target: s0 }
//!     b: { output: s1, target: s1 }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Alphabet, Hypothesis, ProjectId, Transition};
use crate::domain::ports::{ConnectorFactory, ExecuteResult, SymbolConnector};

fn default_reset_symbol() -> String {
    "reset".to_string()
}

/// Transition of a scripted target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEdge {
    /// Output emitted on the edge.
    pub output: String,
    /// Name of the destination state.
    pub target: String,
}

/// A Mealy machine described in YAML.
///
/// `states` maps a state name to its outgoing edges, keyed by input symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealyTarget {
    /// Defaults to `reset`.
    #[serde(default = "default_reset_symbol")]
    pub reset_symbol: String,
    /// Name of the initial state.
    pub initial: String,
    /// Edges per state, keyed by input symbol.
    pub states: BTreeMap<String, BTreeMap<String, TargetEdge>>,
}

impl MealyTarget {
    /// Parse and validate a target.
    pub fn from_yaml_str(yaml: &str) -> DomainResult<Self> {
        let target: Self = serde_yaml::from_str(yaml)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;
        target.validate()?;
        Ok(target)
    }

    /// Read and validate a target file.
    pub fn load(path: &Path) -> DomainResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            DomainError::ValidationFailed(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Checks that the initial state and every edge target exist.
    pub fn validate(&self) -> DomainResult<()> {
        if !self.states.contains_key(&self.initial) {
            return Err(DomainError::ValidationFailed(format!(
                "initial state '{}' is not defined",
                self.initial
            )));
        }
        for (state, edges) in &self.states {
            if let Some((symbol, edge)) = edges
                .iter()
                .find(|(_, edge)| !self.states.contains_key(&edge.target))
            {
                return Err(DomainError::ValidationFailed(format!(
                    "'{state}' --{symbol}--> unknown state '{}'",
                    edge.target
                )));
            }
        }
        Ok(())
    }

    /// Every symbol that appears on some transition, sorted.
    pub fn symbols(&self) -> Vec<String> {
        self.states
            .values()
            .flat_map(|edges| edges.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Learning alphabet covering all symbols of the target.
    pub fn alphabet(&self) -> DomainResult<Alphabet> {
        Alphabet::new(self.symbols(), self.reset_symbol.clone())
    }

    /// The target as a hypothesis over `inputs`; fails if it is not total.
    pub fn to_hypothesis(&self, inputs: &[String]) -> DomainResult<Hypothesis> {
        let names: Vec<&String> = self.states.keys().collect();
        let index_of = |name: &str| names.iter().position(|n| n.as_str() == name);
        let initial = index_of(&self.initial).ok_or_else(|| {
            DomainError::ValidationFailed(format!("unknown initial state '{}'", self.initial))
        })?;

        let transitions = self
            .states
            .iter()
            .map(|(state, edges)| {
                inputs
                    .iter()
                    .map(|input| {
                        let edge = edges.get(input).ok_or_else(|| {
                            DomainError::ValidationFailed(format!(
                                "state '{state}' has no transition for '{input}'"
                            ))
                        })?;
                        let target = index_of(&edge.target).ok_or_else(|| {
                            DomainError::ValidationFailed(format!(
                                "unknown state '{}'",
                                edge.target
                            ))
                        })?;
                        Ok(Transition {
                            output: edge.output.clone(),
                            target,
                        })
                    })
                    .collect::<DomainResult<Vec<_>>>()
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Hypothesis::new(inputs.to_vec(), initial, transitions)
    }

    /// Table form of a hypothesis; state `q` is named `s{q}`.
    pub fn from_hypothesis(hypothesis: &Hypothesis, reset_symbol: impl Into<String>) -> Self {
        let states = hypothesis
            .transitions()
            .iter()
            .enumerate()
            .map(|(state, row)| {
                let edges = hypothesis
                    .inputs()
                    .iter()
                    .zip(row)
                    .map(|(input, edge)| {
                        (
                            input.clone(),
                            TargetEdge {
                                output: edge.output.clone(),
                                target: format!("s{}", edge.target),
                            },
                        )
                    })
                    .collect();
                (format!("s{state}"), edges)
            })
            .collect();

        Self {
            reset_symbol: reset_symbol.into(),
            initial: format!("s{}", hypothesis.initial()),
            states,
        }
    }

    /// Render the target as YAML.
    pub fn to_yaml_string(&self) -> DomainResult<String> {
        serde_yaml::to_string(self).map_err(|e| DomainError::SerializationError(e.to_string()))
    }
}

/// Connector that simulates a [`MealyTarget`].
///
/// Symbols without a transition in the current state execute unsuccessfully
/// and leave the state unchanged.
pub struct ScriptedMealy {
    target: Arc<MealyTarget>,
    state: String,
    closed: bool,
}

impl ScriptedMealy {
    /// Connector positioned in the initial state.
    pub fn new(target: Arc<MealyTarget>) -> Self {
        Self {
            state: target.initial.clone(),
            target,
            closed: false,
        }
    }

    /// Name of the current state.
    pub fn state(&self) -> &str {
        &self.state
    }
}

#[async_trait]
impl SymbolConnector for ScriptedMealy {
    async fn reset(&mut self) -> DomainResult<()> {
        if self.closed {
            return Err(DomainError::SulExecution("connector is closed".to_string()));
        }
        self.state = self.target.initial.clone();
        Ok(())
    }

    async fn execute(&mut self, symbol: &str) -> DomainResult<ExecuteResult> {
        if self.closed {
            return Err(DomainError::SulExecution("connector is closed".to_string()));
        }
        if symbol == self.target.reset_symbol {
            self.state = self.target.initial.clone();
            return Ok(ExecuteResult::ok(""));
        }

        let edge = self
            .target
            .states
            .get(&self.state)
            .and_then(|edges| edges.get(symbol));
        match edge {
            Some(edge) => {
                trace!(from = %self.state, symbol, to = %edge.target, "scripted transition");
                let output = edge.output.clone();
                self.state = edge.target.clone();
                Ok(ExecuteResult::ok(output))
            }
            None => Ok(ExecuteResult::failed("")),
        }
    }

    async fn close(&mut self) -> DomainResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Hands out one [`ScriptedMealy`] per run, all simulating the same target.
#[derive(Debug, Clone)]
pub struct ScriptedConnectorFactory {
    target: Arc<MealyTarget>,
}

impl ScriptedConnectorFactory {
    /// Factory for connectors simulating `target`.
    pub fn new(target: MealyTarget) -> Self {
        Self {
            target: Arc::new(target),
        }
    }

    /// The simulated machine.
    pub fn target(&self) -> &MealyTarget {
        &self.target
    }
}

impl ConnectorFactory for ScriptedConnectorFactory {
    fn create(&self, _project_id: ProjectId) -> DomainResult<Box<dyn SymbolConnector>> {
        Ok(Box::new(ScriptedMealy::new(Arc::clone(&self.target))))
    }
}
