//! Mealy machine snapshots produced by the learning algorithms.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::domain::errors::{DomainError, DomainResult};

use super::word::Word;

/// Outgoing edge of a hypothesis state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Output emitted on this edge.
    pub output: String,
    /// Destination state.
    pub target: usize,
}

/// A finite, complete Mealy machine over a list of input symbols.
///
/// States are `0..size()`. `transitions[q][i]` is the edge taken from state
/// `q` on `inputs[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hypothesis {
    inputs: Vec<String>,
    initial: usize,
    transitions: Vec<Vec<Transition>>,
}

impl Hypothesis {
    /// Build a hypothesis, checking that the transition function is total.
    pub fn new(
        inputs: Vec<String>,
        initial: usize,
        transitions: Vec<Vec<Transition>>,
    ) -> DomainResult<Self> {
        let hypothesis = Self {
            inputs,
            initial,
            transitions,
        };
        hypothesis.validate()?;
        Ok(hypothesis)
    }

    /// Build from `(source, input, output, target)` edges.
    pub fn from_edges<S: AsRef<str>>(
        inputs: &[S],
        initial: usize,
        edges: &[(usize, &str, &str, usize)],
    ) -> DomainResult<Self> {
        let inputs: Vec<String> = inputs.iter().map(|s| s.as_ref().to_string()).collect();
        let size = edges
            .iter()
            .map(|(from, _, _, to)| (*from).max(*to) + 1)
            .max()
            .unwrap_or(0)
            .max(initial + 1);

        let mut table: Vec<Vec<Option<Transition>>> = vec![vec![None; inputs.len()]; size];
        for (from, input, output, to) in edges {
            let idx = inputs.iter().position(|s| s == *input).ok_or_else(|| {
                DomainError::ValidationFailed(format!("unknown input '{input}' in edge list"))
            })?;
            table[*from][idx] = Some(Transition {
                output: (*output).to_string(),
                target: *to,
            });
        }

        let transitions = table
            .into_iter()
            .enumerate()
            .map(|(state, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(idx, edge)| {
                        edge.ok_or_else(|| {
                            DomainError::ValidationFailed(format!(
                                "state {state} has no transition for '{}'",
                                inputs[idx]
                            ))
                        })
                    })
                    .collect::<DomainResult<Vec<_>>>()
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Self::new(inputs, initial, transitions)
    }

    /// Checks that the machine is complete and every target exists.
    pub fn validate(&self) -> DomainResult<()> {
        if self.transitions.is_empty() {
            return Err(DomainError::ValidationFailed(
                "hypothesis must have at least one state".to_string(),
            ));
        }
        if self.initial >= self.transitions.len() {
            return Err(DomainError::ValidationFailed(format!(
                "initial state {} out of range",
                self.initial
            )));
        }
        for (state, row) in self.transitions.iter().enumerate() {
            if row.len() != self.inputs.len() {
                return Err(DomainError::ValidationFailed(format!(
                    "state {state} has {} transitions, expected {}",
                    row.len(),
                    self.inputs.len()
                )));
            }
            if let Some(edge) = row.iter().find(|e| e.target >= self.transitions.len()) {
                return Err(DomainError::ValidationFailed(format!(
                    "state {state} points to unknown state {}",
                    edge.target
                )));
            }
        }
        Ok(())
    }

    /// Input symbols in column order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Initial state.
    pub const fn initial(&self) -> usize {
        self.initial
    }

    /// Number of states.
    pub fn size(&self) -> usize {
        self.transitions.len()
    }

    /// Transition table indexed by state, then input.
    pub fn transitions(&self) -> &[Vec<Transition>] {
        &self.transitions
    }

    /// Follow one edge.
    pub fn step(&self, state: usize, input: &str) -> Option<&Transition> {
        let idx = self.inputs.iter().position(|s| s == input)?;
        self.transitions.get(state)?.get(idx)
    }

    /// Output word produced for `word` from the initial state.
    ///
    /// Returns `None` if the word contains a symbol the hypothesis does not know.
    pub fn output(&self, word: &[String]) -> Option<Word> {
        let mut state = self.initial;
        let mut out = Vec::with_capacity(word.len());
        for input in word {
            let edge = self.step(state, input)?;
            out.push(edge.output.clone());
            state = edge.target;
        }
        Some(out)
    }

    /// Output of `suffix` after reading `prefix`.
    pub fn suffix_output(&self, prefix: &[String], suffix: &[String]) -> Option<Word> {
        let mut state = self.initial;
        for input in prefix {
            state = self.step(state, input)?.target;
        }
        let mut out = Vec::with_capacity(suffix.len());
        for input in suffix {
            let edge = self.step(state, input)?;
            out.push(edge.output.clone());
            state = edge.target;
        }
        Some(out)
    }

    /// Shortest input word on which the two machines produce different outputs.
    ///
    /// Both hypotheses must share the same input set (order may differ).
    pub fn separating_word(&self, other: &Self) -> DomainResult<Option<Word>> {
        let mut mine = self.inputs.clone();
        let mut theirs = other.inputs.clone();
        mine.sort();
        theirs.sort();
        if mine != theirs {
            return Err(DomainError::ValidationFailed(
                "hypotheses are defined over different alphabets".to_string(),
            ));
        }

        let start = (self.initial, other.initial);
        let mut parents: HashMap<(usize, usize), Option<((usize, usize), usize)>> = HashMap::new();
        parents.insert(start, None);
        let mut queue = VecDeque::from([start]);

        while let Some((p, q)) = queue.pop_front() {
            for (idx, input) in self.inputs.iter().enumerate() {
                let left = &self.transitions[p][idx];
                let Some(right) = other.step(q, input) else {
                    continue;
                };

                if left.output != right.output {
                    let mut word = vec![input.clone()];
                    let mut cursor = (p, q);
                    while let Some(Some((parent, via))) = parents.get(&cursor) {
                        word.push(self.inputs[*via].clone());
                        cursor = *parent;
                    }
                    word.reverse();
                    return Ok(Some(word));
                }

                let next = (left.target, right.target);
                if !parents.contains_key(&next) {
                    parents.insert(next, Some(((p, q), idx)));
                    queue.push_back(next);
                }
            }
        }

        Ok(None)
    }
}
