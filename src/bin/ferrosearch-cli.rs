//! A thin demo harness over the `ferrosearch` library, per spec.md §6's
//! public operations: `index <dir> <file>...` builds an index from plain
//! text files; `search <dir> <query>` runs a BM25 query against it. Out
//! of core scope (spec.md §1's Non-goals), kept small and uncommented
//! the way `juanmilkah-indexer`'s `main.rs` demo binary is.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use ferrosearch::core::doc::Document;
use ferrosearch::core::index::reader::IndexReader;
use ferrosearch::core::index::writer::{IndexWriter, IndexWriterConfig};
use ferrosearch::core::search::query::{BooleanQuery, Occur, Query};
use ferrosearch::core::search::searcher::IndexSearcher;
use ferrosearch::core::store::{DirectoryRc, MmapDirectory};

#[derive(Parser, Debug)]
#[command(name = "ferrosearch-cli", about = "Index and search plain text files", version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index one or more text files into `dir`.
    Index {
        /// Index directory, created if it doesn't exist.
        dir: PathBuf,
        /// Text files to add, one document per file.
        files: Vec<PathBuf>,
    },
    /// Run a BM25 query against an index in `dir`.
    Search {
        dir: PathBuf,
        query: String,
        #[arg(short = 'n', long = "top", default_value_t = 10)]
        top: usize,
    },
}

fn open_dir(path: &PathBuf) -> anyhow::Result<DirectoryRc> {
    fs::create_dir_all(path)?;
    Ok(Arc::new(MmapDirectory::open(path.clone())?))
}

fn query_for(text: &str) -> Query {
    let terms: Vec<&str> = text.split_whitespace().collect();
    if terms.len() == 1 {
        return Query::term("body", terms[0].to_lowercase().into_bytes());
    }
    let mut bq = BooleanQuery::new().with_minimum_should_match(1);
    for term in terms {
        bq = bq.add(Occur::Should, Query::term("body", term.to_lowercase().into_bytes()));
    }
    Query::Boolean(Box::new(bq))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Index { dir, files } => {
            let directory = open_dir(&dir)?;
            let writer = IndexWriter::open(directory, IndexWriterConfig::default())?;
            for file in &files {
                let text = fs::read_to_string(file)?;
                let mut doc = Document::new();
                doc.add_text("body", &text, true);
                doc.add_text("path", &file.display().to_string(), true);
                writer.add_document(doc)?;
                println!("indexed {}", file.display());
            }
            writer.commit()?;
        }
        Commands::Search { dir, query, top } => {
            let directory = open_dir(&dir)?;
            let reader = IndexReader::open(directory)?;
            let searcher = IndexSearcher::new(reader);
            let (hits, total) = searcher.search(&query_for(&query), top)?;
            println!("{total} matching document(s)");
            for hit in hits {
                println!("doc {} score {:.4}", hit.doc, hit.score);
            }
        }
    }

    Ok(())
}
