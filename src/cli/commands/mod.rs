//! CLI command implementations.

pub mod compare;
pub mod init;
pub mod learn;
pub mod query;
pub mod results;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::adapters::connectors::MealyTarget;
use crate::adapters::sqlite::{
    database_url, initialize_database, PoolConfig, SqliteLearnerResultRepository,
};
use crate::domain::models::{Alphabet, Config, Word};

pub(crate) async fn open_repository(config: &Config) -> Result<Arc<SqliteLearnerResultRepository>> {
    let url = database_url(&config.database.path);
    let pool = initialize_database(&url, Some(PoolConfig::from(&config.database)))
        .await
        .with_context(|| {
            format!(
                "Failed to open database {}. Run 'statelearner init' first.",
                config.database.path
            )
        })?;
    Ok(Arc::new(SqliteLearnerResultRepository::new(pool)))
}

pub(crate) fn load_target(path: &Path) -> Result<MealyTarget> {
    MealyTarget::load(path).with_context(|| format!("Failed to load target {}", path.display()))
}

/// Alphabet from explicit symbols, or every symbol the target uses.
pub(crate) fn target_alphabet(target: &MealyTarget, symbols: &[String]) -> Result<Alphabet> {
    let symbols = if symbols.is_empty() {
        target.symbols()
    } else {
        symbols.to_vec()
    };
    Ok(Alphabet::new(symbols, target.reset_symbol.clone())?)
}

/// Split a whitespace separated word into symbols.
pub(crate) fn parse_word(text: &str) -> Word {
    text.split_whitespace().map(str::to_string).collect()
}
