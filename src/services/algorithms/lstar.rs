//! Angluin-style L* for Mealy machines.
//!
//! The observation table starts with the single letters as experiments.
//! Counterexamples are processed by adding every suffix of the counterexample
//! to the experiments, which keeps the access rows pairwise distinct and the
//! experiments suffix-closed.

use async_trait::async_trait;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    render_word, Alphabet, CounterExampleQuery, Hypothesis, LearningAlgorithmKind, Transition,
    Word,
};
use crate::domain::ports::{LearningAlgorithm, MembershipOracle};

use super::contradicts;

type Row = Vec<Word>;

/// Angluin-style L* over an observation table.
pub struct LStar {
    alphabet: Vec<String>,
    /// Access words; each identifies one hypothesis state.
    base: Vec<Word>,
    experiments: Vec<Word>,
    /// Row contents of base words and their one-letter extensions.
    table: HashMap<Word, Row>,
    hypothesis: Option<Hypothesis>,
}

impl LStar {
    /// Learner over the symbols of `alphabet`.
    pub fn new(alphabet: &Alphabet) -> Self {
        let symbols = alphabet.symbols().to_vec();
        Self {
            experiments: symbols.iter().map(|s| vec![s.clone()]).collect(),
            alphabet: symbols,
            base: vec![Vec::new()],
            table: HashMap::new(),
            hypothesis: None,
        }
    }

    fn extensions(&self) -> Vec<Word> {
        let mut words = self.base.clone();
        for access in &self.base {
            for symbol in &self.alphabet {
                let mut word = access.clone();
                word.push(symbol.clone());
                words.push(word);
            }
        }
        words
    }

    async fn update_table(&mut self, oracle: &mut dyn MembershipOracle) -> DomainResult<()> {
        let experiment_count = self.experiments.len();
        for word in self.extensions() {
            let stored = self.table.get(&word).map_or(0, Vec::len);
            for experiment in &self.experiments[stored..experiment_count] {
                let output = oracle.answer_query(&word, experiment).await?;
                trace!(
                    row = %render_word(&word),
                    experiment = %render_word(experiment),
                    "filled observation table cell"
                );
                self.table.entry(word.clone()).or_default().push(output);
            }
        }
        Ok(())
    }

    fn row(&self, word: &[String]) -> DomainResult<&Row> {
        self.table.get(word).ok_or_else(|| {
            DomainError::Algorithm(format!("no table row for '{}'", render_word(word)))
        })
    }

    /// Extensions whose row matches no base row, first occurrence of each row only.
    fn rows_to_promote(&self) -> DomainResult<Vec<Word>> {
        let mut known: Vec<&Row> = self
            .base
            .iter()
            .map(|b| self.row(b))
            .collect::<DomainResult<_>>()?;
        let mut promote = Vec::new();
        for access in &self.base {
            for symbol in &self.alphabet {
                let mut word = access.clone();
                word.push(symbol.clone());
                let row = self.row(&word)?;
                if !known.contains(&row) {
                    known.push(row);
                    promote.push(word);
                }
            }
        }
        Ok(promote)
    }

    async fn close_table(&mut self, oracle: &mut dyn MembershipOracle) -> DomainResult<Hypothesis> {
        loop {
            self.update_table(oracle).await?;
            let promote = self.rows_to_promote()?;
            if promote.is_empty() {
                break;
            }
            debug!(count = promote.len(), "promoting rows to base");
            self.base.extend(promote);
        }

        let hypothesis = self.build_hypothesis()?;
        self.hypothesis = Some(hypothesis.clone());
        Ok(hypothesis)
    }

    fn build_hypothesis(&self) -> DomainResult<Hypothesis> {
        let base_rows: Vec<&Row> = self
            .base
            .iter()
            .map(|b| self.row(b))
            .collect::<DomainResult<_>>()?;

        let mut transitions = Vec::with_capacity(self.base.len());
        for (state, access) in self.base.iter().enumerate() {
            let mut edges = Vec::with_capacity(self.alphabet.len());
            for (idx, symbol) in self.alphabet.iter().enumerate() {
                let mut word = access.clone();
                word.push(symbol.clone());
                let target_row = self.row(&word)?;
                let target = base_rows
                    .iter()
                    .position(|r| *r == target_row)
                    .ok_or_else(|| {
                        DomainError::Algorithm(format!(
                            "observation table not closed at '{}'",
                            render_word(&word)
                        ))
                    })?;
                // experiment `idx` is the single letter `symbol`
                let output = base_rows[state][idx].first().cloned().ok_or_else(|| {
                    DomainError::Algorithm(format!("empty output for '{symbol}'"))
                })?;
                edges.push(Transition { output, target });
            }
            transitions.push(edges);
        }

        Hypothesis::new(self.alphabet.clone(), 0, transitions)
    }
}

#[async_trait]
impl LearningAlgorithm for LStar {
    fn kind(&self) -> LearningAlgorithmKind {
        LearningAlgorithmKind::Lstar
    }

    async fn start_learning(
        &mut self,
        oracle: &mut dyn MembershipOracle,
    ) -> DomainResult<Hypothesis> {
        let hypothesis = self.close_table(oracle).await?;
        debug!(states = hypothesis.size(), "L* initial hypothesis");
        Ok(hypothesis)
    }

    async fn refine_hypothesis(
        &mut self,
        oracle: &mut dyn MembershipOracle,
        counter_example: &CounterExampleQuery,
    ) -> DomainResult<Hypothesis> {
        let current = self.hypothesis.as_ref().ok_or_else(|| {
            DomainError::Algorithm("refinement requested before learning started".to_string())
        })?;
        if !contradicts(current, counter_example) {
            return Err(DomainError::Algorithm(format!(
                "'{counter_example}' is not a counterexample for the current hypothesis"
            )));
        }

        let input = counter_example.input();
        for start in 0..input.len() {
            let suffix = input[start..].to_vec();
            if !self.experiments.contains(&suffix) {
                trace!(suffix = %render_word(&suffix), "adding experiment");
                self.experiments.push(suffix);
            }
        }

        let hypothesis = self.close_table(oracle).await?;
        if contradicts(&hypothesis, counter_example) {
            return Err(DomainError::Algorithm(format!(
                "refined hypothesis still disagrees with '{counter_example}'; the SUL may be nondeterministic"
            )));
        }
        debug!(states = hypothesis.size(), "L* refined hypothesis");
        Ok(hypothesis)
    }

    fn hypothesis(&self) -> Option<&Hypothesis> {
        self.hypothesis.as_ref()
    }

    fn internal_diagnostics(&self) -> DomainResult<String> {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);

        let mut header = vec![Cell::new("")];
        header.extend(self.experiments.iter().map(|e| Cell::new(render_word(e))));
        table.set_header(header);

        for word in self.extensions() {
            let marker = if self.base.contains(&word) { "*" } else { " " };
            let mut cells = vec![Cell::new(format!("{marker}{}", render_word(&word)))];
            if let Some(row) = self.table.get(&word) {
                cells.extend(row.iter().map(|out| Cell::new(render_word(out))));
            }
            table.add_row(cells);
        }

        Ok(table.to_string())
    }
}
