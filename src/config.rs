//! Indexer/query runtime configuration.

use serde::{Deserialize, Serialize};

use crate::postings::CompressMethod;

/// The N-gram width used throughout the reference implementation.
pub const DEFAULT_NGRAM_WIDTH: usize = 2;

/// Number of documents buffered in memory before the index buffer is
/// flushed to storage.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 2048;

/// Settings threaded through the indexer, storage adapter, and query
/// evaluator. Constructed once per process; the CLI overlays flag values
/// onto [`IndexerConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub ngram_width: usize,
    pub flush_threshold: usize,
    pub compress_method: CompressMethodConfig,
    pub enable_phrase_search: bool,
    pub max_articles: Option<usize>,
}

/// Serializable mirror of [`CompressMethod`] (the codec type itself isn't
/// `Serialize` since it selects behavior, not data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressMethodConfig {
    None,
    Golomb,
}

impl From<CompressMethodConfig> for CompressMethod {
    fn from(c: CompressMethodConfig) -> Self {
        match c {
            CompressMethodConfig::None => CompressMethod::None,
            CompressMethodConfig::Golomb => CompressMethod::Golomb,
        }
    }
}

impl From<CompressMethod> for CompressMethodConfig {
    fn from(c: CompressMethod) -> Self {
        match c {
            CompressMethod::None => CompressMethodConfig::None,
            CompressMethod::Golomb => CompressMethodConfig::Golomb,
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            ngram_width: DEFAULT_NGRAM_WIDTH,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            compress_method: CompressMethodConfig::Golomb,
            enable_phrase_search: true,
            max_articles: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let cfg = IndexerConfig::default();
        assert_eq!(cfg.ngram_width, 2);
        assert_eq!(cfg.flush_threshold, 2048);
        assert_eq!(cfg.compress_method, CompressMethodConfig::Golomb);
        assert!(cfg.enable_phrase_search);
        assert_eq!(cfg.max_articles, None);
    }
}
