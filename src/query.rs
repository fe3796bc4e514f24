//! Query evaluator: tokenizes a query into a mini-index, intersects
//! postings lists with a galloping skip, optionally checks phrase
//! adjacency, and scores matches by TF-IDF.
//!
//! Grounded on `examples/original_source/search.c` in full
//! (`search_docs`, `search_phrase`, `calc_tf_idf`, `split_query_to_tokens`).

use ahash::AHashMap;

use crate::config::IndexerConfig;
use crate::error::{GramdexError, Result};
use crate::postings::{self, PostingsList};
use crate::storage::Storage;
use crate::tokenizer::{self, TokenizeMode};
use crate::utf32;

/// One ranked, scored result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document_id: i64,
    pub title: String,
    pub score: f64,
}

/// A distinct N-gram in the query: its resolved token id, the number of
/// documents it appears in (used for rarest-first ranking and IDF), and
/// every position at which it occurs inside the query (used for phrase
/// checking).
struct QueryToken {
    token_id: i64,
    docs_count: u32,
    positions_in_query: Vec<u32>,
}

/// Runs a full search: tokenize, resolve tokens, intersect, optionally
/// phrase-check, score, and rank. Returns an empty result set (not an
/// error) if the query tokenizes to nothing matchable, matching the
/// reference's behavior when any query token is unknown to the index.
pub fn search(store: &Storage, query: &str, config: &IndexerConfig) -> Result<Vec<SearchResult>> {
    let query32 = utf32::utf8_to_utf32(query.as_bytes())?;
    if query32.len() < config.ngram_width {
        return Err(GramdexError::QueryTooShort);
    }

    let tokens = tokenizer::tokenize(&query32, config.ngram_width, TokenizeMode::Query)?;

    let mut query_tokens: AHashMap<i64, QueryToken> = AHashMap::new();
    for tok in tokens {
        let text = String::from_utf8_lossy(&tok.text).into_owned();
        // `insert = false`: query-mode token resolution must never create
        // a new token row. A token absent from the store can never match
        // an indexed document.
        let (token_id, docs_count) = store.get_or_create_token_id(&text, false)?;
        if token_id == 0 {
            return Ok(Vec::new());
        }
        query_tokens
            .entry(token_id)
            .and_modify(|qt| qt.positions_in_query.push(tok.position))
            .or_insert_with(|| QueryToken {
                token_id,
                docs_count,
                positions_in_query: vec![tok.position],
            });
    }

    if query_tokens.is_empty() {
        return Ok(Vec::new());
    }

    let mut ordered: Vec<QueryToken> = query_tokens.into_values().collect();
    ordered.sort_by_key(|qt| qt.docs_count);

    let total_docs = store.get_document_count()? as u32;
    let method = config.compress_method.into();

    let mut cursors = Vec::with_capacity(ordered.len());
    for qt in &ordered {
        let (docs_count, blob) = store.get_postings(qt.token_id)?;
        let list = match postings::decode(method, &blob, total_docs, docs_count) {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(token_id = qt.token_id, error = %e, "postings decode error");
                return Ok(Vec::new());
            }
        };
        if list.is_empty() {
            return Ok(Vec::new());
        }
        cursors.push(DocCursor { list, idx: 0 });
    }

    let mut results: Vec<(i64, f64)> = Vec::new();
    let n_tokens = cursors.len();

    'outer: loop {
        if cursors[0].idx >= cursors[0].list.postings.len() {
            break;
        }
        let doc_id = cursors[0].current().document_id;
        let mut next_doc_id: Option<u32> = None;

        for cur in cursors.iter_mut().skip(1) {
            while cur.idx < cur.list.postings.len() && cur.current().document_id < doc_id {
                cur.idx += 1;
            }
            if cur.idx >= cur.list.postings.len() {
                break 'outer;
            }
            if cur.current().document_id != doc_id {
                next_doc_id = Some(match next_doc_id {
                    Some(n) => n.min(cur.current().document_id),
                    None => cur.current().document_id,
                });
            }
        }

        if let Some(next) = next_doc_id {
            while cursors[0].idx < cursors[0].list.postings.len()
                && cursors[0].current().document_id < next
            {
                cursors[0].idx += 1;
            }
        } else {
            let phrase_count = if config.enable_phrase_search {
                search_phrase(&ordered, &cursors)
            } else {
                1
            };
            if phrase_count > 0 {
                let score = calc_tf_idf(&ordered, &cursors, total_docs);
                results.push((doc_id as i64, score));
            }
            cursors[0].idx += 1;
        }
    }

    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = Vec::with_capacity(results.len());
    for (document_id, score) in results {
        let title = store.get_document_title(document_id)?.unwrap_or_default();
        out.push(SearchResult {
            document_id,
            title,
            score,
        });
    }
    Ok(out)
}

struct DocCursor {
    list: PostingsList,
    idx: usize,
}

impl DocCursor {
    fn current(&self) -> &crate::postings::Posting {
        &self.list.postings[self.idx]
    }
}

struct PhraseCursor<'a> {
    base: u32,
    positions: &'a [u32],
    idx: usize,
}

impl<'a> PhraseCursor<'a> {
    fn rel(&self) -> Option<i64> {
        self.positions
            .get(self.idx)
            .map(|&p| p as i64 - self.base as i64)
    }

    fn advance(&mut self) {
        self.idx += 1;
    }

    fn exhausted(&self) -> bool {
        self.idx >= self.positions.len()
    }
}

/// Relative-position intersection over every occurrence of every query
/// token, verifying the document reproduces the query's token layout.
/// Returns the number of phrase matches found (0 means no match).
fn search_phrase(query_tokens: &[QueryToken], cursors: &[DocCursor]) -> u32 {
    let mut phrase_cursors: Vec<PhraseCursor> = Vec::new();
    for (qt, cur) in query_tokens.iter().zip(cursors.iter()) {
        let positions = &cur.current().positions;
        for &base in &qt.positions_in_query {
            phrase_cursors.push(PhraseCursor {
                base,
                positions,
                idx: 0,
            });
        }
    }

    if phrase_cursors.is_empty() {
        return 0;
    }

    let mut phrase_count = 0u32;
    loop {
        let Some(rel) = phrase_cursors[0].rel() else {
            break;
        };
        let mut next_rel: Option<i64> = None;
        let mut mismatch = false;
        for cur in phrase_cursors.iter_mut().skip(1) {
            while !cur.exhausted() && cur.rel().unwrap() < rel {
                cur.advance();
            }
            if cur.exhausted() {
                return phrase_count;
            }
            let cur_rel = cur.rel().unwrap();
            if cur_rel != rel {
                next_rel = Some(next_rel.map_or(cur_rel, |n| n.min(cur_rel)));
                mismatch = true;
                break;
            }
        }
        if mismatch {
            let target = next_rel.unwrap();
            while !phrase_cursors[0].exhausted() && phrase_cursors[0].rel().unwrap() < target {
                phrase_cursors[0].advance();
            }
        } else {
            phrase_count += 1;
            phrase_cursors[0].advance();
        }
    }
    phrase_count
}

fn calc_tf_idf(query_tokens: &[QueryToken], cursors: &[DocCursor], total_docs: u32) -> f64 {
    let mut score = 0.0;
    for (qt, cur) in query_tokens.iter().zip(cursors.iter()) {
        let idf = (total_docs as f64 / qt.docs_count as f64).log2();
        let tf = cur.current().positions.len() as f64;
        score += tf * idf;
    }
    score
}
