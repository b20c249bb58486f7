//! Direct hypothesis construction.
//!
//! States are discovered breadth-first from the empty access word. Two access
//! words denote the same state when they agree on every suffix in the suffix
//! set. Counterexamples extend the suffix set and the hypothesis is rebuilt.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    render_word, Alphabet, CounterExampleQuery, Hypothesis, LearningAlgorithmKind, Transition,
    Word,
};
use crate::domain::ports::{LearningAlgorithm, MembershipOracle};

use super::contradicts;

/// Direct hypothesis construction: a breadth-first tree of access words
/// separated by a growing suffix set.
pub struct Dhc {
    alphabet: Vec<String>,
    suffixes: Vec<Word>,
    /// Answers already obtained, keyed by `(access word, suffix)`.
    answers: HashMap<(Word, Word), Word>,
    hypothesis: Option<Hypothesis>,
}

impl Dhc {
    /// Learner over the symbols of `alphabet`.
    pub fn new(alphabet: &Alphabet) -> Self {
        let symbols = alphabet.symbols().to_vec();
        Self {
            suffixes: symbols.iter().map(|s| vec![s.clone()]).collect(),
            alphabet: symbols,
            answers: HashMap::new(),
            hypothesis: None,
        }
    }

    async fn signature(
        &mut self,
        oracle: &mut dyn MembershipOracle,
        access: &[String],
    ) -> DomainResult<Vec<Word>> {
        let mut signature = Vec::with_capacity(self.suffixes.len());
        for suffix in self.suffixes.clone() {
            let key = (access.to_vec(), suffix);
            let output = match self.answers.get(&key) {
                Some(output) => output.clone(),
                None => {
                    let output = oracle.answer_query(&key.0, &key.1).await?;
                    self.answers.insert(key, output.clone());
                    output
                }
            };
            signature.push(output);
        }
        Ok(signature)
    }

    async fn construct(&mut self, oracle: &mut dyn MembershipOracle) -> DomainResult<Hypothesis> {
        let mut signatures: Vec<Vec<Word>> = Vec::new();
        let mut rows: Vec<Vec<Option<Transition>>> = Vec::new();
        let mut queue: VecDeque<(usize, Word)> = VecDeque::new();

        signatures.push(self.signature(oracle, &[]).await?);
        rows.push(vec![None; self.alphabet.len()]);
        queue.push_back((0, Vec::new()));

        while let Some((state, access)) = queue.pop_front() {
            for (idx, symbol) in self.alphabet.clone().into_iter().enumerate() {
                let mut successor = access.clone();
                successor.push(symbol.clone());
                let signature = self.signature(oracle, &successor).await?;

                let target = match signatures.iter().position(|s| *s == signature) {
                    Some(target) => target,
                    None => {
                        trace!(access = %render_word(&successor), "discovered state");
                        signatures.push(signature);
                        rows.push(vec![None; self.alphabet.len()]);
                        queue.push_back((signatures.len() - 1, successor));
                        signatures.len() - 1
                    }
                };

                // suffix `idx` is the single letter `symbol`
                let output = signatures[state][idx].first().cloned().ok_or_else(|| {
                    DomainError::Algorithm(format!("empty output for '{symbol}'"))
                })?;
                rows[state][idx] = Some(Transition { output, target });
            }
        }

        let transitions = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|edge| {
                        edge.ok_or_else(|| {
                            DomainError::Algorithm("state left without transitions".to_string())
                        })
                    })
                    .collect::<DomainResult<Vec<_>>>()
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let hypothesis = Hypothesis::new(self.alphabet.clone(), 0, transitions)?;
        self.hypothesis = Some(hypothesis.clone());
        Ok(hypothesis)
    }
}

#[async_trait]
impl LearningAlgorithm for Dhc {
    fn kind(&self) -> LearningAlgorithmKind {
        LearningAlgorithmKind::Dhc
    }

    async fn start_learning(
        &mut self,
        oracle: &mut dyn MembershipOracle,
    ) -> DomainResult<Hypothesis> {
        let hypothesis = self.construct(oracle).await?;
        debug!(states = hypothesis.size(), "DHC initial hypothesis");
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
            if !self.suffixes.contains(&suffix) {
                self.suffixes.push(suffix);
            }
        }

        let hypothesis = self.construct(oracle).await?;
        if contradicts(&hypothesis, counter_example) {
            return Err(DomainError::Algorithm(format!(
                "refined hypothesis still disagrees with '{counter_example}'; the SUL may be nondeterministic"
            )));
        }
        debug!(
            states = hypothesis.size(),
            suffixes = self.suffixes.len(),
            "DHC refined hypothesis"
        );
        Ok(hypothesis)
    }

    fn hypothesis(&self) -> Option<&Hypothesis> {
        self.hypothesis.as_ref()
    }
}
