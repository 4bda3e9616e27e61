use crate::analysis::token::{Token, TokenType};

/// Step of a lexicon's pipeline that runs after the tokenizer. Filters edit
/// the token stream in place and never renumber positions, so a dropped
/// token still leaves its gap for phrase search.
pub trait TokenFilter: Send + Sync {
    /// Registry name, e.g. `TokenFilterStem`.
    fn name(&self) -> &str;

    fn apply(&self, tokens: &mut Vec<Token>);

    fn clone_box(&self) -> Box<dyn TokenFilter>;
}

/// Words and delimited fields carry language; n-grams of other scripts don't.
pub(crate) fn is_word(token: &Token) -> bool {
    token.token_type != TokenType::Ngram && !token.text.is_empty()
}
