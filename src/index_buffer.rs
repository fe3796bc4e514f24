//! In-memory token -> postings accumulator with merge-on-flush semantics.

use ahash::AHashMap;

use crate::error::Result;
use crate::postings::{self, CompressMethod, Posting, PostingsList};
use crate::storage::Storage;

pub type TokenId = i64;
pub type DocumentId = i64;

/// Not-yet-flushed postings for one token, plus the document count the
/// buffer believes the token has (seeded from storage on first touch).
#[derive(Debug, Clone, Default)]
pub struct BufferEntry {
    pub docs_count: u32,
    pub postings: PostingsList,
}

/// `token_id -> entry` map. Keys are unique; iteration order is irrelevant.
/// Owned exclusively by the indexer until flushed or merged away.
#[derive(Debug, Default)]
pub struct IndexBuffer {
    entries: AHashMap<TokenId, BufferEntry>,
}

impl IndexBuffer {
    pub fn new() -> Self {
        IndexBuffer::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Records one occurrence of `token_id` at `position` within
    /// `document_id`. `docs_count` is kept exactly in step with the number
    /// of distinct documents posted to this entry so far: it is
    /// incremented only when a new `document_id` starts a new posting,
    /// never on repeat occurrences within the same document, matching the
    /// reference's `merge_inverted_index`, which sums `docs_count` in
    /// lockstep with merging the postings lists themselves.
    ///
    /// Postings are expected to arrive in non-decreasing `document_id`
    /// order per token — the caller (the indexer) processes documents in
    /// ingestion order, so a new `document_id` is always appended at the
    /// end of the token's postings list rather than inserted in the
    /// middle.
    pub fn append_occurrence(&mut self, token_id: TokenId, document_id: DocumentId, position: u32) {
        let entry = self.entries.entry(token_id).or_default();
        match entry.postings.postings.last_mut() {
            Some(last) if last.document_id as i64 == document_id => {
                last.positions.push(position);
            }
            _ => {
                entry.postings.postings.push(Posting {
                    document_id: document_id as u32,
                    positions: vec![position],
                });
                entry.docs_count += 1;
            }
        }
    }

    /// Moves every entry of `src` into `self`, splice-merging postings
    /// lists by ascending `document_id` and summing `docs_count` where a
    /// token appears in both. `src` is consumed.
    pub fn merge(&mut self, src: IndexBuffer) {
        for (token_id, src_entry) in src.entries {
            match self.entries.remove(&token_id) {
                Some(dst_entry) => {
                    let merged_postings = dst_entry.postings.merge(src_entry.postings);
                    self.entries.insert(
                        token_id,
                        BufferEntry {
                            docs_count: dst_entry.docs_count + src_entry.docs_count,
                            postings: merged_postings,
                        },
                    );
                }
                None => {
                    self.entries.insert(token_id, src_entry);
                }
            }
        }
    }

    /// Fetches each entry's persisted postings list, merges this buffer's
    /// postings into it, re-encodes, and overwrites the stored blob and
    /// count. Consumes the buffer; callers discard it (or replace it with
    /// a fresh `IndexBuffer`) after a successful flush.
    pub fn flush(self, store: &Storage, method: CompressMethod) -> Result<()> {
        let total_docs = store.get_document_count()? as u32;
        for (token_id, entry) in self.entries {
            let (stored_docs_count, blob) = store.get_postings(token_id)?;
            let persisted = postings::decode(method, &blob, total_docs, stored_docs_count)?;
            let merged = persisted.merge(entry.postings);
            let docs_count = stored_docs_count + entry.docs_count;
            let encoded = postings::encode(method, &merged, total_docs)?;
            store.update_postings(token_id, docs_count, &encoded)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_occurrence_accumulates_positions() {
        let mut buf = IndexBuffer::new();
        buf.append_occurrence(1, 7, 0);
        buf.append_occurrence(1, 7, 3);
        assert_eq!(buf.len(), 1);
        let entry = &buf.entries[&1];
        assert_eq!(entry.postings.postings.len(), 1);
        assert_eq!(entry.postings.postings[0].positions, vec![0, 3]);
        assert_eq!(entry.docs_count, 1);
    }

    #[test]
    fn append_occurrence_starts_new_posting_on_new_document() {
        let mut buf = IndexBuffer::new();
        buf.append_occurrence(1, 7, 0);
        buf.append_occurrence(1, 8, 0);
        let entry = &buf.entries[&1];
        assert_eq!(entry.postings.postings.len(), 2);
        assert_eq!(entry.docs_count, 2);
    }

    #[test]
    fn docs_count_tracks_distinct_documents_within_one_flush_window() {
        // Both "a" and "b" contain the same token within one buffer, the
        // way a single flush window holds documents from the whole
        // indexing run up to the threshold.
        let mut buf = IndexBuffer::new();
        buf.append_occurrence(1, 1, 0); // document 1: "bc" at position 0
        buf.append_occurrence(1, 2, 1); // document 2: "bc" at position 1
        let entry = &buf.entries[&1];
        assert_eq!(entry.docs_count, 2);
        assert_eq!(entry.postings.postings.len(), 2);
    }

    #[test]
    fn merge_sums_docs_count_for_shared_tokens() {
        let mut a = IndexBuffer::new();
        a.append_occurrence(1, 1, 0);
        let mut b = IndexBuffer::new();
        b.append_occurrence(1, 2, 0);
        a.merge(b);
        let entry = &a.entries[&1];
        assert_eq!(entry.docs_count, 2);
        let ids: Vec<u32> = entry.postings.postings.iter().map(|p| p.document_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn merge_moves_non_overlapping_tokens() {
        let mut a = IndexBuffer::new();
        a.append_occurrence(1, 1, 0);
        let mut b = IndexBuffer::new();
        b.append_occurrence(2, 1, 0);
        a.merge(b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let mut a = IndexBuffer::new();
        a.append_occurrence(1, 1, 0);
        a.merge(IndexBuffer::new());
        assert_eq!(a.len(), 1);
    }
}
