//! Query execution, caching and the learning strategies.

pub mod algorithms;
pub mod membership_cache;
pub mod oracles;
pub mod query_executor;
pub mod strategy_registry;

pub use algorithms::{Dhc, LStar};
pub use membership_cache::{CacheEntries, CacheStats, MembershipCache, QueryPipeline};
pub use oracles::{CompleteOracle, RandomWordOracle, SampleOracle};
pub use query_executor::{QueryCounters, QueryExecutor};
pub use strategy_registry::StrategyRegistry;
