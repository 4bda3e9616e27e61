use std::borrow::Cow;
use rust_stemmers::{Algorithm, Stemmer};
use crate::analysis::filter::{is_word, TokenFilter};
use crate::analysis::token::Token;
use crate::core::error::{Error, Result};

/// `TokenFilterStem`: Snowball stemming of ASCII words. Other tokens pass
/// through untouched.
#[derive(Clone)]
pub struct StemmerFilter {
    name: String,
    language: &'static str,
    algorithm: Algorithm,
}

const LANGUAGES: &[(&str, Algorithm)] = &[
    ("danish", Algorithm::Danish),
    ("dutch", Algorithm::Dutch),
    ("english", Algorithm::English),
    ("french", Algorithm::French),
    ("german", Algorithm::German),
    ("italian", Algorithm::Italian),
    ("norwegian", Algorithm::Norwegian),
    ("portuguese", Algorithm::Portuguese),
    ("spanish", Algorithm::Spanish),
    ("swedish", Algorithm::Swedish),
];

impl StemmerFilter {
    pub fn english() -> Self {
        StemmerFilter { name: "TokenFilterStem".to_string(), language: "english", algorithm: Algorithm::English }
    }

    /// Stemmer for another Snowball language, registered under `name`.
    pub fn for_language(name: &str, language: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid_argument("token filter name is empty"));
        }
        let wanted = language.to_ascii_lowercase();
        let (language, algorithm) = LANGUAGES
            .iter()
            .find(|(known, _)| *known == wanted)
            .copied()
            .ok_or_else(|| Error::invalid_configuration(format!("no stemmer for language '{}'", language)))?;
        Ok(StemmerFilter { name: name.to_string(), language, algorithm })
    }

    pub fn language(&self) -> &str {
        self.language
    }
}

impl TokenFilter for StemmerFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, tokens: &mut Vec<Token>) {
        let stemmer = Stemmer::create(self.algorithm);
        for token in tokens.iter_mut().filter(|t| is_word(t)) {
            if !token.text.bytes().all(|b| b.is_ascii_alphanumeric()) {
                continue;
            }
            let stem = match stemmer.stem(&token.text) {
                Cow::Owned(stem) => stem,
                Cow::Borrowed(_) => continue,
            };
            token.text = stem;
        }
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::TokenType;
    use crate::core::error::ErrorKind;

    #[test]
    fn stems_words_and_skips_ngrams() {
        let mut tokens = vec![
            Token::new("engines".to_string(), 0, 0),
            Token::new("searching".to_string(), 1, 8).with_type(TokenType::Ngram),
        ];
        StemmerFilter::english().apply(&mut tokens);
        assert_eq!(tokens[0].text, "engin");
        assert_eq!(tokens[1].text, "searching");
    }

    #[test]
    fn languages_are_looked_up_by_name() {
        let german = StemmerFilter::for_language("TokenFilterStemGerman", "German").unwrap();
        assert_eq!(german.language(), "german");
        assert_eq!(german.name(), "TokenFilterStemGerman");

        let err = StemmerFilter::for_language("TokenFilterStemKlingon", "klingon").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        let err = StemmerFilter::for_language("", "english").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
