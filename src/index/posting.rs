use crate::compression::delta::DeltaEncoder;
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::Result;
use crate::core::types::RecordId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub id: RecordId,
    pub section: u32,         // 1-based source ordinal, 0 without sections
    pub term_freq: u32,       // Occurrences in this record section
    pub positions: Vec<u32>,  // Token positions for phrase queries
}

impl Posting {
    pub fn new(id: RecordId, section: u32, positions: Vec<u32>) -> Self {
        Posting {
            id,
            section,
            term_freq: positions.len().max(1) as u32,
            positions,
        }
    }
}

/// Posting list for a term
/// Note: Sorted by (record id, section) for efficient merging
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    pub postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    fn locate(&self, id: RecordId, section: u32) -> std::result::Result<usize, usize> {
        self.postings.binary_search_by_key(&(id, section), |p| (p.id, p.section))
    }

    pub fn add_posting(&mut self, posting: Posting) {
        match self.locate(posting.id, posting.section) {
            Ok(pos) => self.postings[pos] = posting,
            Err(pos) => self.postings.insert(pos, posting),
        }
    }

    pub fn remove(&mut self, id: RecordId, section: u32) -> Option<Posting> {
        self.locate(id, section).ok().map(|pos| self.postings.remove(pos))
    }

    /// Postings of `id` across all sections.
    pub fn record(&self, id: RecordId) -> &[Posting] {
        let start = self.postings.partition_point(|p| p.id < id);
        let end = self.postings.partition_point(|p| p.id <= id);
        &self.postings[start..end]
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Number of distinct records holding the term.
    pub fn doc_freq(&self) -> u32 {
        let mut count = 0;
        let mut last = None;
        for posting in &self.postings {
            if last != Some(posting.id) {
                count += 1;
                last = Some(posting.id);
            }
        }
        count
    }

    pub fn total_freq(&self) -> u64 {
        self.postings.iter().map(|p| p.term_freq as u64).sum()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self.postings.iter().map(|p| p.id).collect();
        ids.dedup();
        ids
    }

    /// `[ids (delta)] [per posting: section, tf, positions (delta)]`
    pub fn encode(&self, output: &mut Vec<u8>) {
        let ids: Vec<u32> = self.postings.iter().map(|p| p.id.0).collect();
        DeltaEncoder::encode_u32_list(output, &ids);
        for posting in &self.postings {
            VByteEncoder::encode_u32(output, posting.section);
            VByteEncoder::encode_u32(output, posting.term_freq);
            DeltaEncoder::encode_u32_list(output, &posting.positions);
        }
    }

    pub fn decode(data: &[u8], pos: &mut usize) -> Result<Self> {
        let ids = DeltaEncoder::decode_u32_list(data, pos)?;
        let mut postings = Vec::with_capacity(ids.len());
        for id in ids {
            let (section, consumed) = VByteEncoder::decode_u32(data.get(*pos..).unwrap_or_default())?;
            *pos += consumed;
            let (term_freq, consumed) = VByteEncoder::decode_u32(data.get(*pos..).unwrap_or_default())?;
            *pos += consumed;
            let positions = DeltaEncoder::decode_u32_list(data, pos)?;
            postings.push(Posting { id: RecordId(id), section, term_freq, positions });
        }
        Ok(PostingList { postings })
    }

    /// Intersect two posting lists by record id (simple linear merge)
    pub fn intersect_ids(&self, other: &PostingList) -> Vec<RecordId> {
        let left = self.ids();
        let right = other.ids();
        let mut result = Vec::new();
        let mut i = 0;
        let mut j = 0;

        while i < left.len() && j < right.len() {
            if left[i] == right[j] {
                result.push(left[i]);
                i += 1;
                j += 1;
            } else if left[i] < right[j] {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(id: u32, section: u32, positions: &[u32]) -> Posting {
        Posting::new(RecordId(id), section, positions.to_vec())
    }

    #[test]
    fn postings_stay_sorted_by_record_and_section() {
        let mut list = PostingList::new();
        list.add_posting(posting(7, 2, &[4]));
        list.add_posting(posting(3, 1, &[0, 5]));
        list.add_posting(posting(7, 1, &[1]));
        list.add_posting(posting(3, 1, &[2]));

        let keys: Vec<(u32, u32)> = list.postings.iter().map(|p| (p.id.0, p.section)).collect();
        assert_eq!(keys, vec![(3, 1), (7, 1), (7, 2)]);
        assert_eq!(list.doc_freq(), 2);
        assert_eq!(list.total_freq(), 3);
        assert_eq!(list.record(RecordId(7)).len(), 2);

        assert!(list.remove(RecordId(7), 1).is_some());
        assert!(list.remove(RecordId(7), 1).is_none());
        assert_eq!(list.ids(), vec![RecordId(3), RecordId(7)]);
    }

    #[test]
    fn encoded_list_decodes_after_other_bytes() {
        let mut list = PostingList::new();
        list.add_posting(posting(1, 0, &[0, 3, 9]));
        list.add_posting(posting(1000, 0, &[2]));

        let mut buf = vec![0xAA];
        list.encode(&mut buf);
        let mut pos = 1;
        let decoded = PostingList::decode(&buf, &mut pos).unwrap();
        assert_eq!(pos, buf.len());
        assert_eq!(decoded.postings, list.postings);
    }

    #[test]
    fn intersection_by_record() {
        let mut a = PostingList::new();
        let mut b = PostingList::new();
        for id in [1, 4, 6, 9] {
            a.add_posting(posting(id, 1, &[0]));
        }
        for id in [2, 4, 9, 12] {
            b.add_posting(posting(id, 2, &[1]));
        }
        assert_eq!(a.intersect_ids(&b), vec![RecordId(4), RecordId(9)]);
    }
}
