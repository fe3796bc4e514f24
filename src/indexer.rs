//! Orchestrates indexing: accept a document, tokenize its body, buffer the
//! occurrences, and flush the buffer to storage at a threshold (and once
//! more at end-of-corpus). Grounded on `examples/original_source/wiser.c`'s
//! `add_document`.

use crate::config::IndexerConfig;
use crate::error::Result;
use crate::index_buffer::IndexBuffer;
use crate::storage::Storage;
use crate::tokenizer::{self, TokenizeMode};
use crate::utf32;

/// Drives one indexing run against a [`Storage`] handle. All work for a run
/// happens inside a single storage transaction, started by [`Indexer::new`]
/// and ended by [`Indexer::finish`] (commit) or an early return on error
/// (the caller is expected to roll back).
pub struct Indexer<'a> {
    store: &'a Storage,
    config: IndexerConfig,
    buffer: IndexBuffer,
    buffer_count: usize,
    indexed_count: u64,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a Storage, config: IndexerConfig) -> Result<Indexer<'a>> {
        store.begin()?;
        store.put_settings(
            "compress_method",
            method_str(config.compress_method.into()),
        )?;
        Ok(Indexer {
            store,
            config,
            buffer: IndexBuffer::new(),
            buffer_count: 0,
            indexed_count: 0,
        })
    }

    /// Indexes one `(title, body)` pair: upserts the document row,
    /// tokenizes the body, and records every occurrence in the in-memory
    /// buffer. Flushes the buffer if it has grown past the configured
    /// threshold.
    pub fn add_document(&mut self, title: &str, body: &str) -> Result<()> {
        let document_id = self.store.add_document(title, body)?;

        let body32 = utf32::utf8_to_utf32(body.as_bytes())?;
        let tokens = tokenizer::tokenize(&body32, self.config.ngram_width, TokenizeMode::Index)?;

        for token in tokens {
            let token_str = String::from_utf8_lossy(&token.text);
            // `insert = true`: indexing is the one context allowed to
            // create brand-new token rows.
            let (token_id, _docs_count) = self.store.get_or_create_token_id(&token_str, true)?;
            // `IndexBuffer` derives docs_count itself by counting distinct
            // document_ids posted to each token; the stored row's existing
            // count is folded in separately at flush time by
            // `IndexBuffer::flush`.
            self.buffer
                .append_occurrence(token_id, document_id, token.position);
        }

        self.indexed_count += 1;
        self.buffer_count += 1;
        tracing::debug!(count = self.indexed_count, title, "indexed document");

        if self.buffer_count > self.config.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let buffer = std::mem::take(&mut self.buffer);
        buffer.flush(self.store, self.config.compress_method.into())?;
        tracing::info!(documents = self.buffer_count, "index buffer flushed");
        self.buffer_count = 0;
        Ok(())
    }

    /// Forces a final flush (even if the buffer is below threshold or
    /// empty) and commits the transaction. Matches the reference's
    /// `add_document(&env, NULL, NULL)` sentinel call.
    pub fn finish(mut self) -> Result<()> {
        if self.buffer_count > 0 || !self.buffer.is_empty() {
            self.flush()?;
        }
        self.store.commit()?;
        Ok(())
    }

    /// Rolls back the in-progress transaction, discarding everything
    /// indexed (and not yet flushed) in this run.
    pub fn abort(self) -> Result<()> {
        self.store.rollback()
    }

    pub fn indexed_count(&self) -> u64 {
        self.indexed_count
    }
}

fn method_str(method: crate::postings::CompressMethod) -> &'static str {
    method.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[test]
    fn indexes_and_flushes_on_finish() {
        let store = Storage::open_in_memory().unwrap();
        let mut indexer = Indexer::new(&store, IndexerConfig::default()).unwrap();
        indexer.add_document("a", "hello world").unwrap();
        assert_eq!(indexer.indexed_count(), 1);
        indexer.finish().unwrap();

        assert_eq!(store.get_document_count().unwrap(), 1);
        let (id, docs_count) = store.get_or_create_token_id("he", false).unwrap();
        assert_ne!(id, 0);
        assert_eq!(docs_count, 1);
    }

    #[test]
    fn flush_triggers_at_threshold() {
        let store = Storage::open_in_memory().unwrap();
        let mut config = IndexerConfig::default();
        config.flush_threshold = 1;
        let mut indexer = Indexer::new(&store, config).unwrap();
        indexer.add_document("a", "hello").unwrap();
        indexer.add_document("b", "world").unwrap();
        // the second add_document should have crossed the threshold and
        // flushed already.
        indexer.finish().unwrap();
        let (_, docs_count) = store.get_or_create_token_id("he", false).unwrap();
        assert_eq!(docs_count, 1);
    }

    #[test]
    fn records_compress_method_setting() {
        let store = Storage::open_in_memory().unwrap();
        let indexer = Indexer::new(&store, IndexerConfig::default()).unwrap();
        indexer.finish().unwrap();
        assert_eq!(
            store.get_settings("compress_method").unwrap(),
            Some("golomb".to_string())
        );
    }
}
