mod common;

use proptest::prelude::*;
use std::sync::Arc;

use statelearner::adapters::connectors::{MealyTarget, ScriptedMealy};
use statelearner::domain::models::{Alphabet, Word};
use statelearner::domain::ports::MembershipOracle;
use statelearner::services::{MembershipCache, QueryExecutor};

use common::{mod_counter, toggle_target};

fn executor(target: &MealyTarget, alphabet: &Alphabet) -> QueryExecutor {
    QueryExecutor::new(
        Box::new(ScriptedMealy::new(Arc::new(target.clone()))),
        alphabet,
    )
}

fn words(symbols: &'static [&'static str]) -> impl Strategy<Value = Vec<Word>> {
    let word = prop::collection::vec(
        prop::sample::select(symbols).prop_map(str::to_string),
        0..8,
    );
    prop::collection::vec(word, 1..30)
}

/// Answers every word both through the cache and directly against the SUL.
fn compare(target: &MealyTarget, alphabet: &Alphabet, queries: &[Word]) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

    runtime.block_on(async {
        let mut direct = executor(target, alphabet);
        let mut cache = MembershipCache::new(executor(target, alphabet));

        for word in queries {
            let expected = direct.answer(word).await.unwrap();
            let cached = cache.answer(word).await.unwrap();
            prop_assert_eq!(&cached, &expected, "word {:?}", word);
            prop_assert_eq!(cache.lookup(word).is_some(), !word.is_empty());
        }

        let stats = cache.stats();
        let non_empty = queries.iter().filter(|w| !w.is_empty()).count() as u64;
        prop_assert_eq!(stats.hits + stats.misses, non_empty);
        // only misses reach the SUL, and never more often than without a cache
        prop_assert_eq!(cache.executor().counters().resets, stats.misses);
        prop_assert!(cache.executor().counters().resets <= direct.counters().resets);
        prop_assert!(cache.executor().counters().symbols <= direct.counters().symbols);
        Ok(())
    })
}

proptest! {
    /// Property: the cache answers exactly what the SUL would answer
    #[test]
    fn prop_cache_agrees_with_toggle_target(queries in words(&["a", "b"])) {
        let alphabet = Alphabet::new(["a", "b"], "reset").unwrap();
        compare(&toggle_target(), &alphabet, &queries)?;
    }

    /// Property: same for a counter whose outputs depend on the whole history
    #[test]
    fn prop_cache_agrees_with_counter_target(queries in words(&["tick"])) {
        let alphabet = Alphabet::new(["tick"], "reset").unwrap();
        compare(&mod_counter(5), &alphabet, &queries)?;
    }

    /// Property: a repeated word never touches the SUL a second time
    #[test]
    fn prop_repeated_word_is_a_hit(queries in words(&["a", "b"])) {
        let alphabet = Alphabet::new(["a", "b"], "reset").unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let mut cache = MembershipCache::new(executor(&toggle_target(), &alphabet));
            for word in &queries {
                let first = cache.answer(word).await.unwrap();
                let resets = cache.executor().counters().resets;
                let second = cache.answer(word).await.unwrap();
                prop_assert_eq!(first, second);
                prop_assert_eq!(cache.executor().counters().resets, resets);
            }
            Ok(())
        })?;
    }
}
