//! Error types for the search engine core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GramdexError>;

#[derive(Error, Debug)]
pub enum GramdexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invalid UTF-8 input at byte offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("query is shorter than the configured n-gram width")]
    QueryTooShort,

    #[error("truncated postings blob")]
    TruncatedPostings,

    #[error("invalid Golomb-Rice parameter (m = 0)")]
    InvalidGolombParameter,

    #[error("decoded postings length {actual} does not match stored docs_count {expected}")]
    PostingsLengthMismatch { expected: usize, actual: usize },

    #[error("malformed corpus XML: {0}")]
    Ingest(#[from] quick_xml::Error),
}
