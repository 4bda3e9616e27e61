/// Scorer trait
pub trait Scorer: Send + Sync {
    fn score(&self, term: &TermStats, doc_stats: &DocStats) -> f64;

    fn name(&self) -> &str;
}

/// Per matched term statistics
#[derive(Debug, Clone, Copy)]
pub struct TermStats {
    pub term_freq: u32,   // Occurrences in the record
    pub doc_freq: u32,    // Records holding the term
    pub weight: f64,      // Query-side weight
}

/// Record statistics for scoring
#[derive(Debug, Clone, Copy)]
pub struct DocStats {
    pub doc_length: u32,      // Number of tokens in the record
    pub avg_doc_length: f64,  // Average record length in the index
    pub total_docs: u32,      // Total number of indexed records
}

/// Term frequency scorer: every occurrence of a query term adds its weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfScorer;

impl Scorer for TfScorer {
    fn score(&self, term: &TermStats, _doc_stats: &DocStats) -> f64 {
        term.term_freq as f64 * term.weight
    }

    fn name(&self) -> &str {
        "tf"
    }
}

/// BM25 Scorer
#[derive(Debug, Clone, Copy)]
pub struct Bm25Scorer {
    pub k1: f64,  // Term frequency saturation (default: 1.2)
    pub b: f64,   // Length normalization strength (default: 0.75)
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Bm25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Bm25Scorer {
    /// Never negative, so a match always outranks a non-match.
    fn idf(doc_freq: u32, total_docs: u32) -> f64 {
        let n = total_docs.max(doc_freq) as f64;
        let df = doc_freq as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

impl Scorer for Bm25Scorer {
    fn score(&self, term: &TermStats, doc_stats: &DocStats) -> f64 {
        let tf = term.term_freq as f64;
        let doc_len = doc_stats.doc_length as f64;
        let avg_doc_len = if doc_stats.avg_doc_length > 0.0 { doc_stats.avg_doc_length } else { 1.0 };
        let idf = Self::idf(term.doc_freq, doc_stats.total_docs);

        // BM25 formula
        let numerator = idf * tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len));

        term.weight * numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}
