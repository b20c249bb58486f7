//! Membership query cache and the per-run query pipeline.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::trace;

use crate::domain::errors::DomainResult;
use crate::domain::models::Word;
use crate::domain::ports::MembershipOracle;

use super::query_executor::{QueryCounters, QueryExecutor};

/// Observed outputs keyed by the input word issued after a reset.
pub type CacheEntries = HashMap<Word, Word>;

/// Cache hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Words answered from the cache.
    pub hits: u64,
    /// Words forwarded to the SUL.
    pub misses: u64,
}

/// Memoises SUL answers for one run.
///
/// Every answered word also records the outputs of all its prefixes. A word
/// is only served from the cache after it (or an extension of it) was
/// actually observed on the SUL.
pub struct MembershipCache {
    executor: QueryExecutor,
    entries: CacheEntries,
    stats: CacheStats,
}

impl MembershipCache {
    /// Empty cache in front of `executor`.
    pub fn new(executor: QueryExecutor) -> Self {
        Self::with_entries(executor, CacheEntries::new())
    }

    /// Start from entries observed by an earlier run.
    pub fn with_entries(executor: QueryExecutor, entries: CacheEntries) -> Self {
        Self {
            executor,
            entries,
            stats: CacheStats::default(),
        }
    }

    /// Cached output for `word`, if observed.
    pub fn lookup(&self, word: &[String]) -> Option<&Word> {
        self.entries.get(word)
    }

    /// Number of cached words.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hits and misses so far.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The executor answering misses.
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Mutable access to the executor answering misses.
    pub fn executor_mut(&mut self) -> &mut QueryExecutor {
        &mut self.executor
    }

    /// Everything observed so far.
    pub fn entries(&self) -> &CacheEntries {
        &self.entries
    }

    /// Split into the executor and the observed entries.
    pub fn into_parts(self) -> (QueryExecutor, CacheEntries) {
        (self.executor, self.entries)
    }

    fn record(&mut self, word: &[String], output: &[String]) {
        for len in 1..=word.len() {
            self.entries
                .entry(word[..len].to_vec())
                .or_insert_with(|| output[..len].to_vec());
        }
    }
}

#[async_trait]
impl MembershipOracle for MembershipCache {
    async fn answer(&mut self, word: &[String]) -> DomainResult<Word> {
        if word.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(output) = self.entries.get(word) {
            self.stats.hits += 1;
            trace!(hits = self.stats.hits, "membership cache hit");
            return Ok(output.clone());
        }

        self.stats.misses += 1;
        let output = self.executor.answer(word).await?;
        self.record(word, &output);
        Ok(output)
    }
}

/// The membership oracle a run hands to its strategies.
pub enum QueryPipeline {
    /// Every query reaches the SUL.
    Direct(QueryExecutor),
    /// Queries go through a membership cache.
    Cached(MembershipCache),
}

impl QueryPipeline {
    /// Build the pipeline, seeding the cache with `entries` when enabled.
    pub fn new(executor: QueryExecutor, use_cache: bool, entries: Option<CacheEntries>) -> Self {
        if use_cache {
            Self::Cached(MembershipCache::with_entries(
                executor,
                entries.unwrap_or_default(),
            ))
        } else {
            Self::Direct(executor)
        }
    }

    /// The executor beneath the cache, if any.
    pub fn executor_mut(&mut self) -> &mut QueryExecutor {
        match self {
            Self::Direct(executor) => executor,
            Self::Cached(cache) => cache.executor_mut(),
        }
    }

    /// Read and zero the SUL counters.
    pub fn take_counters(&mut self) -> QueryCounters {
        self.executor_mut().take_counters()
    }

    /// Close the underlying executor.
    pub async fn close(&mut self) -> DomainResult<()> {
        self.executor_mut().close().await
    }

    /// Hit and miss counts since the run began, if caching is enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        match self {
            Self::Direct(_) => None,
            Self::Cached(cache) => Some(cache.stats()),
        }
    }

    /// Cache contents, if caching is enabled.
    pub fn into_entries(self) -> Option<CacheEntries> {
        match self {
            Self::Direct(_) => None,
            Self::Cached(cache) => Some(cache.into_parts().1),
        }
    }
}

#[async_trait]
impl MembershipOracle for QueryPipeline {
    async fn answer(&mut self, word: &[String]) -> DomainResult<Word> {
        match self {
            Self::Direct(executor) => executor.answer(word).await,
            Self::Cached(cache) => cache.answer(word).await,
        }
    }
}
