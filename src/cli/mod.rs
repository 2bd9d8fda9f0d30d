//! CLI module for forum-rag
//!
//! Command-line parsing for the `forum-rag` binary: building the index,
//! serving queries over HTTP, answering a single question and checking the
//! configuration. Uses clap for argument parsing and owo-colors for colored
//! terminal output.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// forum-rag - question answering over forum conversations
///
/// Builds a vector index from a forum corpus and answers questions with
/// what other users said, grounded in the retrieved conversations.
#[derive(Parser, Debug)]
#[command(
    name = "forum-rag",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "forum-rag - question answering over forum conversations",
    long_about = "Retrieval-augmented question answering over forum conversations.\n\n\
                  Use 'index' to build the vector index from a corpus, 'serve' to start\n\
                  the HTTP query service and 'ask' to answer a single question.",
    after_help = "EXAMPLES:\n    \
                  forum-rag index --corpus threads.json          # Build the index\n    \
                  forum-rag index --corpus threads.json -l 100   # Index the first 100 threads\n    \
                  forum-rag serve                                # Start the query service\n    \
                  forum-rag ask \"Mein Kind schläft schlecht\"     # Answer one question\n    \
                  forum-rag --config my.toml config --validate   # Check a config file"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "forum-rag.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the vector index from a JSON corpus
    ///
    /// Preprocesses every thread, chunks the normalized text, embeds the
    /// chunks and writes them to the configured index backend.
    Index {
        /// JSON corpus file (array of threads with title and posts)
        #[arg(long)]
        corpus: PathBuf,

        /// Only index the first N threads
        #[arg(short, long)]
        limit: Option<usize>,

        /// Also write the normalized corpus text to this file
        #[arg(long)]
        normalized_out: Option<PathBuf>,
    },

    /// Start the HTTP query service
    Serve,

    /// Answer a single question and exit
    Ask {
        /// The question to answer
        question: String,

        /// Print the sources behind the answer
        #[arg(short, long)]
        sources: bool,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
