//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "campus-assistant",
    version,
    about = "Match campus questions to the topic documents that answer them",
    long_about = "campus-assistant parses curated campus topic documents, expands their keywords with \
                  same-sound spellings and routes questions to the topic they are about. Answers are \
                  quoted from the matched document when no completion service is attached."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/campus-assistant/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a question and rank the topics it refers to
    Match {
        /// Question text
        query: String,

        /// Maximum number of ranked topics to show (defaults to retrieval.limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the matched topic document
    Ask {
        /// Question to ask
        question: String,

        /// Answer only from this topic (e.g. "dining")
        #[arg(short, long, value_name = "ID")]
        topic: Option<String>,

        /// Show the answer in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List registered topics
    Topics,

    /// Show the parsed document of a topic
    Show {
        /// Topic id (e.g. "dining")
        topic: String,

        /// Show the document in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the same-sound spellings of a token
    Expand {
        /// Token to expand
        token: String,
    },

    /// Build the keyword index and print it
    Index {
        /// Show the index in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration and template files
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
