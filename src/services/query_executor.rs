//! Query executor: drives the symbol connector and counts what it costs.

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Alphabet, Word};
use crate::domain::ports::{MembershipOracle, SymbolConnector};

/// Output token used when a successful execution reports no output.
pub const OUTPUT_OK: &str = "OK";
/// Output token used when a failed execution reports no output.
pub const OUTPUT_FAILED: &str = "FAILED";

/// Resets and symbols executed since the counters were last taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCounters {
    /// Membership queries, one reset each.
    pub resets: u64,
    /// Symbols executed, including the resets.
    pub symbols: u64,
}

/// Wraps one connector for the lifetime of a run.
///
/// `close` must be called before the executor is dropped; a second call is a
/// no-op.
pub struct QueryExecutor {
    connector: Box<dyn SymbolConnector>,
    reset_symbol: String,
    counters: QueryCounters,
    closed: bool,
}

impl QueryExecutor {
    /// Wrap `connector`; `alphabet` supplies the reset symbol.
    pub fn new(connector: Box<dyn SymbolConnector>, alphabet: &Alphabet) -> Self {
        Self {
            connector,
            reset_symbol: alphabet.reset_symbol().to_string(),
            counters: QueryCounters::default(),
            closed: false,
        }
    }

    /// Begin a fresh query from the initial state.
    pub async fn reset(&mut self) -> DomainResult<()> {
        self.ensure_open()?;
        self.counters.resets += 1;
        self.connector.reset().await.map_err(sul_error)?;

        let result = self
            .connector
            .execute(&self.reset_symbol)
            .await
            .map_err(sul_error)?;
        if !result.success {
            return Err(DomainError::SulExecution(format!(
                "reset symbol '{}' could not be executed: {}",
                self.reset_symbol, result.output
            )));
        }
        trace!(resets = self.counters.resets, "SUL reset");
        Ok(())
    }

    /// Execute one input symbol and return its output token.
    pub async fn step(&mut self, symbol: &str) -> DomainResult<String> {
        self.ensure_open()?;
        self.counters.symbols += 1;
        let result = self.connector.execute(symbol).await.map_err(sul_error)?;

        let output = if !result.output.is_empty() {
            result.output
        } else if result.success {
            OUTPUT_OK.to_string()
        } else {
            OUTPUT_FAILED.to_string()
        };
        trace!(symbol, output = %output, "SUL step");
        Ok(output)
    }

    /// Release the connector. Safe to call more than once.
    pub async fn close(&mut self) -> DomainResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!(
            resets = self.counters.resets,
            symbols = self.counters.symbols,
            "closing query executor"
        );
        self.connector.close().await.map_err(sul_error)
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Counters without zeroing them.
    pub fn counters(&self) -> QueryCounters {
        self.counters
    }

    /// Read and zero the counters.
    pub fn take_counters(&mut self) -> QueryCounters {
        std::mem::take(&mut self.counters)
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.closed {
            return Err(DomainError::SulExecution(
                "query executor already closed".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipOracle for QueryExecutor {
    async fn answer(&mut self, word: &[String]) -> DomainResult<Word> {
        if word.is_empty() {
            return Ok(Vec::new());
        }
        self.reset().await?;
        let mut output = Vec::with_capacity(word.len());
        for symbol in word {
            output.push(self.step(symbol).await?);
        }
        Ok(output)
    }
}

fn sul_error(err: DomainError) -> DomainError {
    match err {
        DomainError::SulExecution(_) => err,
        other => DomainError::SulExecution(other.to_string()),
    }
}
