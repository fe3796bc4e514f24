//! Streaming XML corpus ingester: turns a MediaWiki-export-shaped document
//! into a stream of `(title, body)` pairs without buffering the whole file.
//!
//! Grounded on `examples/original_source/wikiload.c`'s `expat` SAX handlers
//! (`start`/`end`/`element_data`) and `wikipedia_status` enum, ported to
//! `quick_xml`'s pull-reader style.

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::Result;

/// Mirrors the reference's `wikipedia_status` enum: which nested tag is
/// currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Document,
    Page,
    PageTitle,
    PageId,
    PageRevision,
    PageRevisionText,
}

/// A single ingested article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub body: String,
}

/// Streams `(title, body)` pairs out of `reader`, calling `on_article` for
/// each completed `<page>`. Stops (without error) once `max_articles`
/// articles have been emitted, if given.
pub fn ingest<R: BufRead>(
    reader: R,
    max_articles: Option<usize>,
    mut on_article: impl FnMut(&Article) -> Result<()>,
) -> Result<usize> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text = false;

    let mut state = State::Document;
    let mut title = String::new();
    let mut body = String::new();
    let mut article_count = 0usize;
    let mut buf = Vec::new();

    loop {
        if let Some(max) = max_articles {
            if article_count >= max {
                break;
            }
        }
        match xml.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                state = match (state, name) {
                    (State::Document, b"page") => State::Page,
                    (State::Page, b"title") => {
                        title.clear();
                        State::PageTitle
                    }
                    (State::Page, b"id") => State::PageId,
                    (State::Page, b"revision") => State::PageRevision,
                    (State::PageRevision, b"text") => {
                        body.clear();
                        State::PageRevisionText
                    }
                    (s, _) => s,
                };
            }
            Event::End(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                state = match (state, name) {
                    (State::Page, b"page") => State::Document,
                    (State::PageTitle, b"title") => State::Page,
                    (State::PageId, b"id") => State::Page,
                    (State::PageRevision, b"revision") => State::Page,
                    (State::PageRevisionText, b"text") => {
                        let article = Article {
                            title: title.clone(),
                            body: body.clone(),
                        };
                        on_article(&article)?;
                        article_count += 1;
                        State::PageRevision
                    }
                    (s, _) => s,
                };
            }
            Event::Text(e) => {
                let text = e.unescape().unwrap_or_default().into_owned();
                match state {
                    State::PageTitle => title.push_str(&text),
                    State::PageRevisionText => body.push_str(&text),
                    _ => {}
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                match state {
                    State::PageTitle => title.push_str(&text),
                    State::PageRevisionText => body.push_str(&text),
                    _ => {}
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(article_count)
}
