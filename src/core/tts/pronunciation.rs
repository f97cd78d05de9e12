use regex::{NoExpand, Regex};
use tracing::error;

use super::base::Pronunciation;

/// Compiled pronunciation replacement patterns
#[derive(Debug, Clone, Default)]
pub struct PronunciationReplacer {
    patterns: Vec<(Regex, String)>,
}

impl PronunciationReplacer {
    /// Compile one word-boundary pattern per configured pronunciation.
    ///
    /// A boundary is only required on a side where the word starts or ends
    /// with a word character, so entries such as `Dr.` still match. Entries
    /// whose pattern fails to compile are logged and skipped.
    pub fn new(pronunciations: &[Pronunciation]) -> Self {
        let patterns = pronunciations
            .iter()
            .filter(|p| !p.word.is_empty())
            .filter_map(|p| {
                Regex::new(&whole_word_pattern(&p.word))
                    .map(|regex| (regex, p.pronunciation.clone()))
                    .map_err(|e| error!("Invalid pronunciation pattern for '{}': {}", p.word, e))
                    .ok()
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn apply(&self, text: &str) -> String {
        self.patterns
            .iter()
            .fold(text.to_string(), |acc, (pattern, replacement)| {
                pattern
                    .replace_all(&acc, NoExpand(replacement.as_str()))
                    .into_owned()
            })
    }
}

fn whole_word_pattern(word: &str) -> String {
    let is_word_char = |c: char| c.is_alphanumeric() || c == '_';
    let leading = if word.starts_with(is_word_char) { r"\b" } else { "" };
    let trailing = if word.ends_with(is_word_char) { r"\b" } else { "" };
    format!("{leading}{}{trailing}", regex::escape(word))
}
