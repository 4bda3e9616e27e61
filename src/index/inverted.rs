use std::collections::{BTreeMap, HashMap};
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::Result;
use crate::core::types::RecordId;
use crate::index::posting::{Posting, PostingList};
use crate::scoring::scorer::{DocStats, Scorer, TermStats};

/// How query tokens combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchOperator {
    /// All tokens at consecutive positions (all tokens when positions are not kept)
    #[default]
    Phrase,
    And,
    Or,
}

/// A query token resolved against the lexicon. `term` is `None` when the
/// lexicon has never seen the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTerm {
    pub term: Option<RecordId>,
    pub position: u32,
}

/// Postings to install for one record section, replacing whatever the
/// section held before. Built completely before the index is touched.
#[derive(Debug, Clone)]
pub struct IndexDelta {
    pub id: RecordId,
    pub section: u32,
    pub added: Vec<(RecordId, Posting)>,
}

impl IndexDelta {
    pub fn clear(id: RecordId, section: u32) -> Self {
        IndexDelta { id, section, added: Vec::new() }
    }
}

#[derive(Debug, Clone, Default)]
struct SectionTerms {
    terms: Vec<RecordId>,
    length: u32,
}

/// Inverted index structure: lexicon term id -> postings over source records.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    postings: HashMap<RecordId, PostingList>,
    // Forward view used to retract a section's previous postings.
    sections: HashMap<RecordId, BTreeMap<u32, SectionTerms>>,
    total_tokens: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex::default()
    }

    pub fn clear(&mut self) {
        *self = InvertedIndex::new();
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn doc_count(&self) -> usize {
        self.sections.len()
    }

    pub fn postings(&self, term: RecordId) -> Option<&PostingList> {
        self.postings.get(&term)
    }

    /// Terms currently indexed for `id` in `section`.
    pub fn terms_of(&self, id: RecordId, section: u32) -> Vec<RecordId> {
        self.sections
            .get(&id)
            .and_then(|sections| sections.get(&section))
            .map(|s| s.terms.clone())
            .unwrap_or_default()
    }

    fn retract(&mut self, id: RecordId, section: u32) {
        let old = match self.sections.get_mut(&id) {
            Some(sections) => {
                let old = sections.remove(&section);
                if sections.is_empty() {
                    self.sections.remove(&id);
                }
                old
            }
            None => None,
        };
        if let Some(old) = old {
            self.total_tokens -= old.length as u64;
            for term in old.terms {
                if let Some(list) = self.postings.get_mut(&term) {
                    list.remove(id, section);
                    if list.is_empty() {
                        self.postings.remove(&term);
                    }
                }
            }
        }
    }

    /// Installs a delta. Cannot fail; every fallible step happened while
    /// building it.
    pub fn apply(&mut self, delta: IndexDelta) {
        self.retract(delta.id, delta.section);
        if delta.added.is_empty() {
            return;
        }

        let mut entry = SectionTerms::default();
        for (term, mut posting) in delta.added {
            posting.id = delta.id;
            posting.section = delta.section;
            entry.length += posting.term_freq;
            entry.terms.push(term);
            self.postings.entry(term).or_default().add_posting(posting);
        }
        self.total_tokens += entry.length as u64;
        self.sections.entry(delta.id).or_default().insert(delta.section, entry);
    }

    /// Drops every posting of `id`.
    pub fn remove_record(&mut self, id: RecordId) {
        let sections: Vec<u32> = self
            .sections
            .get(&id)
            .map(|s| s.keys().copied().collect())
            .unwrap_or_default();
        for section in sections {
            self.retract(id, section);
        }
    }

    /// Drops a lexicon term and its postings, e.g. when the term record is deleted.
    pub fn remove_term(&mut self, term: RecordId) {
        let list = match self.postings.remove(&term) {
            Some(list) => list,
            None => return,
        };
        for posting in list.postings {
            if let Some(entry) = self
                .sections
                .get_mut(&posting.id)
                .and_then(|sections| sections.get_mut(&posting.section))
            {
                entry.terms.retain(|t| *t != term);
                entry.length -= posting.term_freq;
                self.total_tokens -= posting.term_freq as u64;
            }
        }
    }

    fn doc_stats(&self, id: RecordId) -> DocStats {
        let doc_length = self
            .sections
            .get(&id)
            .map(|s| s.values().map(|e| e.length).sum())
            .unwrap_or(0);
        let total_docs = self.sections.len() as u32;
        DocStats {
            doc_length,
            avg_doc_length: if total_docs == 0 { 0.0 } else { self.total_tokens as f64 / total_docs as f64 },
            total_docs,
        }
    }

    /// Matching records with scores, best first, ties by ascending id.
    pub fn search(
        &self,
        query: &[QueryTerm],
        operator: SearchOperator,
        scorer: &dyn Scorer,
        with_position: bool,
    ) -> Vec<(RecordId, f64)> {
        if query.is_empty() {
            return Vec::new();
        }
        let mut hits = match operator {
            SearchOperator::Or => self.search_or(query, scorer),
            SearchOperator::And => self.search_and(query, scorer),
            SearchOperator::Phrase if with_position => self.search_phrase(query, scorer),
            SearchOperator::Phrase => self.search_and(query, scorer),
        };
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits
    }

    fn resolved<'a>(&'a self, query: &[QueryTerm]) -> Option<Vec<&'a PostingList>> {
        query
            .iter()
            .map(|q| q.term.and_then(|term| self.postings.get(&term)))
            .collect()
    }

    fn term_score(&self, list: &PostingList, id: RecordId, term_freq: u32, scorer: &dyn Scorer) -> f64 {
        let stats = TermStats {
            term_freq,
            doc_freq: list.doc_freq(),
            weight: 1.0,
        };
        scorer.score(&stats, &self.doc_stats(id))
    }

    fn record_freq(list: &PostingList, id: RecordId) -> u32 {
        list.record(id).iter().map(|p| p.term_freq).sum()
    }

    fn search_or(&self, query: &[QueryTerm], scorer: &dyn Scorer) -> Vec<(RecordId, f64)> {
        let mut seen: Vec<RecordId> = Vec::new();
        let mut scores: HashMap<RecordId, f64> = HashMap::new();
        for term in query.iter().filter_map(|q| q.term) {
            if seen.contains(&term) {
                continue;
            }
            seen.push(term);
            let list = match self.postings.get(&term) {
                Some(list) => list,
                None => continue,
            };
            for id in list.ids() {
                let score = self.term_score(list, id, Self::record_freq(list, id), scorer);
                *scores.entry(id).or_insert(0.0) += score;
            }
        }
        scores.into_iter().collect()
    }

    fn candidates(lists: &[&PostingList]) -> Vec<RecordId> {
        let mut ids = match lists.first() {
            Some(first) => first.ids(),
            None => return Vec::new(),
        };
        for list in &lists[1..] {
            let other = list.ids();
            ids.retain(|id| other.binary_search(id).is_ok());
        }
        ids
    }

    fn search_and(&self, query: &[QueryTerm], scorer: &dyn Scorer) -> Vec<(RecordId, f64)> {
        let mut lists = match self.resolved(query) {
            Some(lists) => lists,
            None => return Vec::new(),
        };
        lists.dedup_by(|a, b| std::ptr::eq(*a, *b));
        Self::candidates(&lists)
            .into_iter()
            .map(|id| {
                let score = lists
                    .iter()
                    .map(|list| self.term_score(list, id, Self::record_freq(list, id), scorer))
                    .sum();
                (id, score)
            })
            .collect()
    }

    fn search_phrase(&self, query: &[QueryTerm], scorer: &dyn Scorer) -> Vec<(RecordId, f64)> {
        let lists = match self.resolved(query) {
            Some(lists) => lists,
            None => return Vec::new(),
        };
        let base = query[0].position as i64;
        let offsets: Vec<i64> = query.iter().map(|q| q.position as i64 - base).collect();

        let mut hits = Vec::new();
        for id in Self::candidates(&lists) {
            let mut occurrences = 0u32;
            for first in lists[0].record(id) {
                for &start in &first.positions {
                    let matched = lists.iter().zip(&offsets).skip(1).all(|(list, offset)| {
                        let want = start as i64 + offset;
                        want >= 0
                            && list.record(id).iter().any(|p| {
                                p.section == first.section && p.positions.binary_search(&(want as u32)).is_ok()
                            })
                    });
                    if matched {
                        occurrences += 1;
                    }
                }
            }
            if occurrences > 0 {
                let score = lists
                    .iter()
                    .map(|list| self.term_score(list, id, occurrences, scorer))
                    .sum();
                hits.push((id, score));
            }
        }
        hits
    }

    /// `[term count] [per term: term id, posting list]`
    pub fn encode(&self) -> Vec<u8> {
        let mut terms: Vec<&RecordId> = self.postings.keys().collect();
        terms.sort();
        let mut output = Vec::new();
        VByteEncoder::encode_u32(&mut output, terms.len() as u32);
        for term in terms {
            VByteEncoder::encode_u32(&mut output, term.0);
            self.postings[term].encode(&mut output);
        }
        output
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut pos = 0usize;
        let (count, consumed) = VByteEncoder::decode_u32(data)?;
        pos += consumed;

        let mut index = InvertedIndex::new();
        for _ in 0..count {
            let (term, consumed) = VByteEncoder::decode_u32(data.get(pos..).unwrap_or_default())?;
            pos += consumed;
            let term = RecordId(term);
            let list = PostingList::decode(data, &mut pos)?;
            for posting in &list.postings {
                let entry = index
                    .sections
                    .entry(posting.id)
                    .or_default()
                    .entry(posting.section)
                    .or_default();
                entry.terms.push(term);
                entry.length += posting.term_freq;
                index.total_tokens += posting.term_freq as u64;
            }
            index.postings.insert(term, list);
        }
        Ok(index)
    }
}
