//! Command-line driver: parses flags, wires the ingester, indexer, and
//! query evaluator together, reports results.
//!
//! Grounded on `examples/original_source/wiser.c`'s `main`: flag surface,
//! the "refuse to index into an existing db file" guard, and the
//! index-then-search ordering within one invocation.

use std::fs;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gramdex::config::IndexerConfig;
use gramdex::error::Result;
use gramdex::indexer::Indexer;
use gramdex::ingest;
use gramdex::postings::CompressMethod;
use gramdex::query;
use gramdex::storage::Storage;

/// A small full-text search engine: N-gram indexer and query evaluator
/// backed by a SQLite store.
#[derive(Parser, Debug)]
#[command(name = "gramdex-cli", version, about)]
struct Cli {
    /// Postings compression method.
    #[arg(short = 'c', long = "compress", value_name = "none|golomb")]
    compress: Option<String>,

    /// Index the given MediaWiki-export XML file. Refuses to run if
    /// db_file already exists.
    #[arg(short = 'x', long = "index", value_name = "xml_path")]
    index: Option<PathBuf>,

    /// Run a search query against the opened store.
    #[arg(short = 'q', long = "query", value_name = "query")]
    query: Option<String>,

    /// Cap the number of articles ingested.
    #[arg(short = 'm', long = "max-docs", value_name = "max_docs")]
    max_docs: Option<usize>,

    /// Override the index buffer's flush threshold.
    #[arg(short = 't', long = "flush-threshold", value_name = "threshold")]
    flush_threshold: Option<usize>,

    /// Disable phrase-adjacency checking in the query evaluator.
    #[arg(short = 's', long = "no-phrase")]
    no_phrase: bool,

    /// Path to the SQLite database file.
    db_file: PathBuf,
}

const EXIT_USAGE: u8 = 2;
const EXIT_DB_EXISTS: u8 = 3;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "gramdex-cli failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let mut config = IndexerConfig::default();
    if let Some(method) = &cli.compress {
        config.compress_method = CompressMethod::parse(method).into();
    }
    if let Some(max_docs) = cli.max_docs {
        config.max_articles = Some(max_docs);
    }
    if let Some(threshold) = cli.flush_threshold {
        config.flush_threshold = threshold;
    }
    if cli.no_phrase {
        config.enable_phrase_search = false;
    }

    if let Some(xml_path) = &cli.index {
        if cli.db_file.exists() {
            tracing::error!(path = %cli.db_file.display(), "refusing to index into existing db file");
            return Ok(EXIT_DB_EXISTS);
        }

        let store = Storage::open(&cli.db_file)?;
        let mut indexer = Indexer::new(&store, config.clone())?;

        let file = fs::File::open(xml_path)?;
        let reader = BufReader::new(file);
        let result = ingest::ingest(reader, config.max_articles, |article| {
            indexer.add_document(&article.title, &article.body)
        });

        match result {
            Ok(count) => {
                indexer.finish()?;
                tracing::info!(articles = count, "index run complete");
            }
            Err(e) => {
                indexer.abort()?;
                return Err(e);
            }
        }
    }

    if let Some(query_str) = &cli.query {
        let store = Storage::open(&cli.db_file)?;
        if let Some(stored) = store.get_settings("compress_method")? {
            config.compress_method = CompressMethod::parse(&stored).into();
        }

        let results = query::search(&store, query_str, &config)?;
        for result in &results {
            println!("{}\t{}\t{:.4}", result.document_id, result.title, result.score);
        }
        tracing::info!(matches = results.len(), "search complete");
    }

    Ok(0)
}
