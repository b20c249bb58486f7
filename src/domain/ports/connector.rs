//! Symbol connector port - the side-effecting primitive a run drives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::ProjectId;

/// Outcome of executing a single symbol against the system under learning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResult {
    /// `false` makes the executor fail the query.
    pub success: bool,
    /// Output reported by the connector; may be empty.
    #[serde(default)]
    pub output: String,
}

impl ExecuteResult {
    /// Successful execution with the given output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    /// Failed execution; `output` carries the reason.
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Connection to the system under learning.
///
/// Errors returned here are reported as SUL execution failures by the query
/// executor. `success: false` is a regular output, not an error.
#[async_trait]
pub trait SymbolConnector: Send + Sync {
    /// Bring the system back to its initial state.
    async fn reset(&mut self) -> DomainResult<()>;

    /// Execute one symbol by identifier.
    async fn execute(&mut self, symbol: &str) -> DomainResult<ExecuteResult>;

    /// Release held resources.
    async fn close(&mut self) -> DomainResult<()>;
}

/// Factory for per-run connectors.
pub trait ConnectorFactory: Send + Sync {
    /// Create a connector for a run of the given project.
    fn create(&self, project_id: ProjectId) -> DomainResult<Box<dyn SymbolConnector>>;
}
