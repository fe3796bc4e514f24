//! N-gram tokenizer over UTF-32 text.
//!
//! Splits text into fixed-width character N-grams, skipping a fixed set of
//! ignored characters (ASCII whitespace/punctuation plus a handful of
//! full-width Unicode punctuation marks). Index mode and query mode differ
//! only in whether trailing fragments shorter than `n` are emitted.

use crate::utf32;

/// Whether a token stream is being built for indexing (keep short trailing
/// fragments) or for a search query (drop them; they can never match an
/// indexed token).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeMode {
    Index,
    Query,
}

/// One emitted N-gram: its zero-based position in the token stream and its
/// UTF-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub position: u32,
    pub text: Vec<u8>,
}

fn is_ignored_char(c: u32) -> bool {
    matches!(
        c,
        0x20 | 0x0C | 0x0A | 0x0D | 0x09 | 0x0B
            | 0x21..=0x2F // ! " # $ % & ' ( ) * + , - . /
            | 0x3A..=0x40 // : ; < = > ? @
            | 0x5B..=0x5E // [ \ ] ^
            | 0x5F
            | 0x60
            | 0x7B..=0x7E // { | } ~
            | 0x3000 | 0x3001 | 0x3002 | 0xFF08 | 0xFF09
    )
}

/// Extracts the next N-gram starting at or after `start`. Returns the
/// number of codepoints consumed as leading ignored characters plus the
/// emitted token, or `None` once the input is exhausted.
fn ngram_next(text: &[u32], start: usize, n: usize) -> Option<(usize, &[u32])> {
    let mut i = start;
    while i < text.len() && is_ignored_char(text[i]) {
        i += 1;
    }
    if i >= text.len() {
        return None;
    }
    let mut j = i;
    while j < text.len() && j - i < n && !is_ignored_char(text[j]) {
        j += 1;
    }
    Some((i, &text[i..j]))
}

/// Splits `text` into positional N-grams of width `n` (`n >= 1`).
///
/// In [`TokenizeMode::Query`], trailing fragments shorter than `n` are
/// dropped since they cannot appear as indexed tokens.
pub fn tokenize(text: &[u32], n: usize, mode: TokenizeMode) -> crate::error::Result<Vec<Token>> {
    assert!(n >= 1, "n-gram width must be at least 1");
    let mut tokens = Vec::new();
    let mut cursor = 0;
    let mut position: u32 = 0;
    while let Some((start, gram)) = ngram_next(text, cursor, n) {
        if gram.len() >= n || mode == TokenizeMode::Index {
            let mut bytes = Vec::with_capacity(gram.len() * utf32::MAX_UTF8_SIZE);
            for &cp in gram {
                utf32::encode_char(cp, &mut bytes)?;
            }
            tokens.push(Token {
                position,
                text: bytes,
            });
        }
        cursor = start + 1;
        position += 1;
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utf32::utf8_to_utf32;

    fn tokens_as_strings(text: &str, n: usize, mode: TokenizeMode) -> Vec<String> {
        let cps = utf8_to_utf32(text.as_bytes()).unwrap();
        tokenize(&cps, n, mode)
            .unwrap()
            .into_iter()
            .map(|t| String::from_utf8(t.text).unwrap())
            .collect()
    }

    #[test]
    fn index_mode_keeps_trailing_fragment() {
        let toks = tokens_as_strings("abc", 2, TokenizeMode::Index);
        assert_eq!(toks, vec!["ab", "bc", "c"]);
    }

    #[test]
    fn query_mode_drops_trailing_fragment() {
        let toks = tokens_as_strings("abc", 2, TokenizeMode::Query);
        assert_eq!(toks, vec!["ab", "bc"]);
    }

    #[test]
    fn ignores_punctuation_and_whitespace() {
        let toks = tokens_as_strings("hello world", 2, TokenizeMode::Index);
        assert!(toks.iter().all(|t| !t.contains(' ')));
        assert!(toks.contains(&"he".to_string()));
        assert!(toks.contains(&"wo".to_string()));
    }

    #[test]
    fn japanese_punctuation_splits_tokens() {
        let toks = tokens_as_strings("東京、京都", 2, TokenizeMode::Index);
        assert!(toks.contains(&"東京".to_string()));
        assert!(toks.contains(&"京都".to_string()));
        assert!(!toks.iter().any(|t| t.contains('、')));
    }

    #[test]
    fn positions_increment_per_emitted_token() {
        let cps = utf8_to_utf32("ab cd".as_bytes()).unwrap();
        let toks = tokenize(&cps, 2, TokenizeMode::Index).unwrap();
        let positions: Vec<u32> = toks.iter().map(|t| t.position).collect();
        assert_eq!(positions.len(), toks.len());
        assert!(positions.windows(2).all(|w| w[1] > w[0]));
    }
}
