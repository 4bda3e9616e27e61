use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Normalizer that every analyzer runs ahead of its lexicon's filters.
/// `offset` and `length` keep pointing at the original bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn name(&self) -> &str {
        "TokenFilterLowercase"
    }

    fn apply(&self, tokens: &mut Vec<Token>) {
        for token in tokens.iter_mut() {
            if token.text.is_ascii() {
                token.text.make_ascii_lowercase();
            } else if token.text.chars().any(char::is_uppercase) {
                token.text = token.text.to_lowercase();
            }
        }
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_without_moving_offsets() {
        let mut tokens = vec![Token::new("Groonga".to_string(), 0, 0), Token::new("ÄRGER".to_string(), 1, 8)];
        LowercaseFilter.apply(&mut tokens);
        assert_eq!(tokens[0].text, "groonga");
        assert_eq!(tokens[1].text, "ärger");
        assert_eq!((tokens[1].offset, tokens[1].length), (8, "ÄRGER".len()));
    }
}
