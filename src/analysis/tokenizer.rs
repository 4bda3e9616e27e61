use crate::analysis::token::{Token, TokenType, TokenizeMode};
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str, mode: TokenizeMode) -> Vec<Token>;

    fn name(&self) -> &str;

    fn clone_box(&self) -> Box<dyn Tokenizer>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Space,
    Alnum,
    Other,
}

fn classify(grapheme: &str) -> CharClass {
    if grapheme.chars().all(char::is_whitespace) {
        CharClass::Space
    } else if grapheme.bytes().all(|b| b.is_ascii_alphanumeric()) {
        CharClass::Alnum
    } else {
        CharClass::Other
    }
}

/// N-gram tokenizer in the style of `TokenBigram`: runs of ASCII letters and
/// digits are kept whole, every other run of characters is cut into n-grams.
#[derive(Debug, Clone)]
pub struct NgramTokenizer {
    pub n: usize,
    name: String,
}

impl NgramTokenizer {
    pub fn new(name: &str, n: usize) -> Self {
        NgramTokenizer { n: n.max(1), name: name.to_string() }
    }

    pub fn unigram() -> Self {
        Self::new("TokenUnigram", 1)
    }

    pub fn bigram() -> Self {
        Self::new("TokenBigram", 2)
    }

    pub fn trigram() -> Self {
        Self::new("TokenTrigram", 3)
    }

    fn push_grams(
        &self,
        text: &str,
        run: &[(usize, &str)],
        mode: TokenizeMode,
        position: &mut u32,
        tokens: &mut Vec<Token>,
    ) {
        let n = self.n;
        let len = run.len();
        let starts: Vec<usize> = match mode {
            TokenizeMode::Query if len > n => (0..=len - n).collect(),
            TokenizeMode::Query => vec![0],
            TokenizeMode::Add => (0..len).collect(),
        };
        for start in starts {
            let end = (start + n).min(len);
            let from = run[start].0;
            let to = run[end - 1].0 + run[end - 1].1.len();
            tokens.push(Token::new(text[from..to].to_string(), *position, from).with_type(TokenType::Ngram));
            *position += 1;
        }
    }
}

impl Tokenizer for NgramTokenizer {
    fn tokenize(&self, text: &str, mode: TokenizeMode) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;
        let mut run: Vec<(usize, &str)> = Vec::new();
        let mut run_class = CharClass::Space;

        for (offset, grapheme) in text.grapheme_indices(true) {
            let class = classify(grapheme);
            if class != run_class && !run.is_empty() {
                self.flush(text, &run, run_class, mode, &mut position, &mut tokens);
                run.clear();
            }
            run_class = class;
            if class != CharClass::Space {
                run.push((offset, grapheme));
            }
        }
        if !run.is_empty() {
            self.flush(text, &run, run_class, mode, &mut position, &mut tokens);
        }

        tokens
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(self.clone())
    }
}

impl NgramTokenizer {
    fn flush(
        &self,
        text: &str,
        run: &[(usize, &str)],
        class: CharClass,
        mode: TokenizeMode,
        position: &mut u32,
        tokens: &mut Vec<Token>,
    ) {
        match class {
            CharClass::Space => {}
            CharClass::Alnum => {
                let from = run[0].0;
                let last = run[run.len() - 1];
                let to = last.0 + last.1.len();
                tokens.push(Token::new(text[from..to].to_string(), *position, from));
                *position += 1;
            }
            CharClass::Other => self.push_grams(text, run, mode, position, tokens),
        }
    }
}

/// `TokenDelimit`: whitespace separated fields.
#[derive(Debug, Clone, Default)]
pub struct DelimitTokenizer;

impl Tokenizer for DelimitTokenizer {
    fn tokenize(&self, text: &str, _mode: TokenizeMode) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut start = None;
        for (offset, ch) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
            match (ch.is_whitespace(), start) {
                (true, Some(from)) => {
                    let position = tokens.len() as u32;
                    tokens.push(Token::new(text[from..offset].to_string(), position, from).with_type(TokenType::Value));
                    start = None;
                }
                (false, None) => start = Some(offset),
                _ => {}
            }
        }
        tokens
    }

    fn name(&self) -> &str {
        "TokenDelimit"
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(DelimitTokenizer)
    }
}

/// Used when a lexicon names no tokenizer: the whole trimmed value is the
/// only token.
#[derive(Debug, Clone, Default)]
pub struct WholeValueTokenizer;

impl Tokenizer for WholeValueTokenizer {
    fn tokenize(&self, text: &str, _mode: TokenizeMode) -> Vec<Token> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let offset = text.len() - text.trim_start().len();
        vec![Token::new(trimmed.to_string(), 0, offset).with_type(TokenType::Value)]
    }

    fn name(&self) -> &str {
        "none"
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(WholeValueTokenizer)
    }
}
