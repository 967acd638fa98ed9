//! CLI module for Vidya.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Vidya - AI tutor for certification exam preparation
///
/// Answers exam questions with tool-augmented LLM agents, serves a streaming
/// chat API, and indexes study materials for semantic search.
#[derive(Parser, Debug)]
#[command(name = "vidya")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP chat server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the tutor a question and stream the answer
    Ask {
        /// The question to ask
        question: String,

        /// Exam id from the catalog
        #[arg(short, long)]
        exam: Option<String>,

        /// Response language code (e.g. hi-IN)
        #[arg(short, long, default_value = "en-US")]
        language: String,

        /// Run a single agent (tutor, mcq_explainer, fact_checker) instead of the chat loop
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Index study material passages from a JSONL file
    Ingest {
        /// JSONL file with one {"text", "document_name", "page_number"} object per line
        path: String,

        /// Exam whose collection receives the passages
        #[arg(short, long)]
        exam: String,

        /// Delete the collection before indexing
        #[arg(long)]
        replace: bool,
    },

    /// List the exam catalog and indexed collections
    Exams,

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

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "orchestrator.max_tool_rounds")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["vidya", "-v", "ask", "What is NAV?", "--exam", "mf_foundation", "-l", "hi-IN"])
            .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Ask {
                question,
                exam,
                language,
                agent,
            } => {
                assert_eq!(question, "What is NAV?");
                assert_eq!(exam.as_deref(), Some("mf_foundation"));
                assert_eq!(language, "hi-IN");
                assert!(agent.is_none());
            }
            other => panic!("Expected ask, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["vidya", "config", "set", "server.port", "9000"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Set { .. }
            }
        ));
    }
}
