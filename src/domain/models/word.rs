//! Words over the input alphabet and counterexample queries.

use serde::{Deserialize, Serialize};

/// A sequence of input symbols or output tokens.
pub type Word = Vec<String>;

/// Render a word as `a b c`, or `ε` for the empty word.
pub fn render_word(word: &[String]) -> String {
    if word.is_empty() {
        "ε".to_string()
    } else {
        word.join(" ")
    }
}

/// A query that exposed a difference between hypothesis and SUL.
///
/// `output` is what the SUL produced for `suffix` after being driven through
/// `prefix` from its initial state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterExampleQuery {
    /// Access sequence executed first.
    #[serde(default)]
    pub prefix: Word,
    /// Inputs whose outputs are compared.
    #[serde(default)]
    pub suffix: Word,
    /// SUL output for `suffix`.
    #[serde(default)]
    pub output: Word,
}

impl CounterExampleQuery {
    /// Counterexample from its three parts.
    pub fn new(prefix: Word, suffix: Word, output: Word) -> Self {
        Self {
            prefix,
            suffix,
            output,
        }
    }

    /// Prefix and suffix concatenated.
    pub fn input(&self) -> Word {
        self.prefix.iter().chain(&self.suffix).cloned().collect()
    }
}

impl std::fmt::Display for CounterExampleQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} / {}",
            render_word(&self.prefix),
            render_word(&self.suffix),
            render_word(&self.output)
        )
    }
}
