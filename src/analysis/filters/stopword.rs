use std::collections::BTreeSet;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;
use crate::core::error::{Error, Result};

const ENGLISH: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with",
];

/// `TokenFilterStopWord`: drops listed words. The survivors keep their
/// positions.
#[derive(Debug, Clone)]
pub struct StopWordFilter {
    name: String,
    words: BTreeSet<String>,
}

impl StopWordFilter {
    pub fn english() -> Self {
        StopWordFilter {
            name: "TokenFilterStopWord".to_string(),
            words: ENGLISH.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Custom list registered under `name`. Words are compared after the
    /// lowercase normalizer, so the list must already be lowercase.
    pub fn with_words<I, S>(name: &str, words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if name.is_empty() {
            return Err(Error::invalid_argument("token filter name is empty"));
        }
        let mut set = BTreeSet::new();
        for word in words {
            let word = word.as_ref().trim();
            if word.is_empty() {
                return Err(Error::invalid_argument(format!("{}: empty stop word", name)));
            }
            if word.chars().any(char::is_uppercase) {
                return Err(Error::invalid_argument(format!("{}: stop word '{}' is not lowercase", name, word)));
            }
            set.insert(word.to_string());
        }
        Ok(StopWordFilter { name: name.to_string(), words: set })
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }
}

impl TokenFilter for StopWordFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, tokens: &mut Vec<Token>) {
        tokens.retain(|token| !self.words.contains(&token.text));
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(self.clone())
    }
}
