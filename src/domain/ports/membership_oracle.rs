//! Membership oracle port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Word;

/// Answers membership queries: run a word from reset and report its outputs.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// Output word for `word`, one token per input symbol.
    async fn answer(&mut self, word: &[String]) -> DomainResult<Word>;

    /// Output produced for `suffix` after reading `prefix`.
    async fn answer_query(&mut self, prefix: &[String], suffix: &[String]) -> DomainResult<Word> {
        let word: Vec<String> = prefix.iter().chain(suffix).cloned().collect();
        let mut output = self.answer(&word).await?;
        Ok(output.split_off(prefix.len().min(output.len())))
    }
}
