//! Input alphabet of a learning run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::errors::{DomainError, DomainResult};

/// Ordered set of unique input symbol identifiers plus the reset symbol.
///
/// The reset symbol is executed at the start of every membership query and is
/// never part of the learning alphabet itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alphabet {
    symbols: Vec<String>,
    reset_symbol: String,
}

impl Alphabet {
    /// Create a validated alphabet.
    pub fn new<I, S>(symbols: I, reset_symbol: impl Into<String>) -> DomainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let alphabet = Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            reset_symbol: reset_symbol.into(),
        };
        alphabet.validate()?;
        Ok(alphabet)
    }

    /// Check the invariants. Deserialized alphabets are validated through this too.
    pub fn validate(&self) -> DomainResult<()> {
        if self.symbols.is_empty() {
            return Err(DomainError::ValidationFailed(
                "alphabet must contain at least one symbol".to_string(),
            ));
        }
        if self.reset_symbol.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "reset symbol cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            if symbol.trim().is_empty() {
                return Err(DomainError::ValidationFailed(
                    "alphabet symbols cannot be empty".to_string(),
                ));
            }
            if !seen.insert(symbol.as_str()) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate symbol '{symbol}' in alphabet"
                )));
            }
        }

        if seen.contains(self.reset_symbol.as_str()) {
            return Err(DomainError::ValidationFailed(format!(
                "reset symbol '{}' must not be part of the learning alphabet",
                self.reset_symbol
            )));
        }

        Ok(())
    }

    /// Learning symbols, excluding the reset symbol.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Symbol that returns the SUL to its initial state.
    pub fn reset_symbol(&self) -> &str {
        &self.reset_symbol
    }

    /// Number of learning symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether there are no learning symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Whether `symbol` is a learning symbol.
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Position of a symbol in the alphabet.
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Ensure every symbol of `word` belongs to the alphabet.
    pub fn check_word(&self, word: &[String]) -> DomainResult<()> {
        match word.iter().find(|s| !self.contains(s)) {
            Some(unknown) => Err(DomainError::ValidationFailed(format!(
                "symbol '{unknown}' is not part of the alphabet"
            ))),
            None => Ok(()),
        }
    }
}
