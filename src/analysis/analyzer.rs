use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::{Token, TokenizeMode};
use crate::analysis::tokenizer::{DelimitTokenizer, NgramTokenizer, Tokenizer, WholeValueTokenizer};
use crate::core::error::{Error, Result};

/// Text analysis pipeline: tokenizer, lowercase normalization, then the
/// lexicon's token filters in order.
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            name: tokenizer.name().to_string(),
            tokenizer,
            filters: vec![Box::new(LowercaseFilter)],
        }
    }

    /// Analyzer of lexicons without a tokenizer.
    pub fn whole_value() -> Self {
        Analyzer::new(Box::new(WholeValueTokenizer))
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        // the normalizer is always in front
        if filter.name() != LowercaseFilter.name() {
            self.filters.push(filter);
        }
        self
    }

    pub fn analyze(&self, text: &str, mode: TokenizeMode) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text, mode);

        for filter in &self.filters {
            filter.apply(&mut tokens);
        }

        tokens
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

impl Clone for Analyzer {
    fn clone(&self) -> Self {
        Analyzer {
            tokenizer: self.tokenizer.clone_box(),
            filters: self.filters.iter().map(|f| f.clone_box()).collect(),
            name: self.name.clone(),
        }
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("tokenizer", &self.tokenizer.name())
            .field("filters", &self.filter_names())
            .finish()
    }
}

/// Named tokenizers and token filters available to lexicons of one database.
pub struct AnalyzerRegistry {
    tokenizers: Arc<RwLock<HashMap<String, Box<dyn Tokenizer>>>>,
    filters: Arc<RwLock<HashMap<String, Box<dyn TokenFilter>>>>,
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let registry = AnalyzerRegistry {
            tokenizers: Arc::new(RwLock::new(HashMap::new())),
            filters: Arc::new(RwLock::new(HashMap::new())),
        };

        // Register builtin tokenizers and filters
        registry.register_defaults();
        registry
    }

    fn register_defaults(&self) {
        self.register_tokenizer(Box::new(NgramTokenizer::unigram()));
        self.register_tokenizer(Box::new(NgramTokenizer::bigram()));
        self.register_tokenizer(Box::new(NgramTokenizer::trigram()));
        self.register_tokenizer(Box::new(DelimitTokenizer));
        self.register_filter(Box::new(LowercaseFilter));
        self.register_filter(Box::new(StopWordFilter::english()));
        self.register_filter(Box::new(StemmerFilter::english()));
    }

    /// Registers under the tokenizer's own name, replacing any previous one.
    pub fn register_tokenizer(&self, tokenizer: Box<dyn Tokenizer>) {
        let mut tokenizers = self.tokenizers.write();
        tokenizers.insert(tokenizer.name().to_string(), tokenizer);
    }

    pub fn register_filter(&self, filter: Box<dyn TokenFilter>) {
        let mut filters = self.filters.write();
        filters.insert(filter.name().to_string(), filter);
    }

    pub fn has_tokenizer(&self, name: &str) -> bool {
        self.tokenizers.read().contains_key(name)
    }

    pub fn tokenizer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tokenizers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds the pipeline for `tokenizer` (`None` = whole value) and `filters`.
    pub fn build(&self, tokenizer: Option<&str>, filters: &[String]) -> Result<Analyzer> {
        let mut analyzer = match tokenizer {
            None => Analyzer::whole_value(),
            Some(name) => {
                let tokenizers = self.tokenizers.read();
                let tokenizer = tokenizers
                    .get(name)
                    .ok_or_else(|| Error::not_found(format!("tokenizer '{}' not found", name)))?;
                Analyzer::new(tokenizer.clone_box())
            }
        };

        let registered = self.filters.read();
        for name in filters {
            let filter = registered
                .get(name)
                .ok_or_else(|| Error::not_found(format!("token filter '{}' not found", name)))?;
            analyzer = analyzer.add_filter(filter.clone_box());
        }
        Ok(analyzer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn texts(tokens: Vec<Token>) -> Vec<String> {
        tokens.into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn lowercase_runs_before_other_filters() {
        let registry = AnalyzerRegistry::new();
        let analyzer = registry
            .build(
                Some("TokenBigram"),
                &["TokenFilterStopWord".to_string(), "TokenFilterStem".to_string()],
            )
            .unwrap();
        assert_eq!(analyzer.filter_names(), vec!["TokenFilterLowercase", "TokenFilterStopWord", "TokenFilterStem"]);

        let tokens = analyzer.analyze("The Engines of Search", TokenizeMode::Add);
        assert_eq!(tokens.iter().map(|t| t.position).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(texts(tokens), vec!["engin", "search"]);
    }

    #[test]
    fn missing_tokenizer_indexes_whole_value() {
        let registry = AnalyzerRegistry::new();
        let analyzer = registry.build(None, &[]).unwrap();
        assert_eq!(texts(analyzer.analyze("Groonga Rocks", TokenizeMode::Query)), vec!["groonga rocks"]);
    }

    #[test]
    fn unknown_names_are_not_found() {
        let registry = AnalyzerRegistry::new();
        assert_eq!(registry.build(Some("TokenMecab"), &[]).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            registry.build(None, &["TokenFilterNFKC".to_string()]).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn custom_filters_are_used_by_name() {
        let registry = AnalyzerRegistry::new();
        let filter = StopWordFilter::with_words("TokenFilterStopWordJa", ["検索"]).unwrap();
        registry.register_filter(Box::new(filter));
        let analyzer = registry.build(Some("TokenBigram"), &["TokenFilterStopWordJa".to_string()]).unwrap();
        let tokens = analyzer.analyze("全文検索", TokenizeMode::Query);
        assert_eq!(texts(tokens), vec!["全文", "文検"]);
    }

    #[test]
    fn custom_tokenizers_can_be_registered() {
        let registry = AnalyzerRegistry::new();
        registry.register_tokenizer(Box::new(NgramTokenizer::new("TokenQuadgram", 4)));
        assert!(registry.has_tokenizer("TokenQuadgram"));
        let analyzer = registry.build(Some("TokenQuadgram"), &[]).unwrap();
        assert_eq!(texts(analyzer.analyze("全文検索エンジン", TokenizeMode::Query)).len(), 5);
    }
}
