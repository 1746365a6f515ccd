//! Command-line interface for Polyroute
//!
//! Argument parsing and subcommand handling for the Polyroute binary.

use clap::{Parser, Subcommand};

/// Smart routing gateway for OpenAI-compatible LLM backends
#[derive(Parser)]
#[command(name = "polyroute")]
#[command(version)]
#[command(about = "Smart routing gateway for OpenAI-compatible LLM backends")]
#[command(
    long_about = "Polyroute routes each prompt to the cheapest capable backend model, \
    validates the answer, and retries or escalates to a stronger tier when it falls short. \
    It can also fan one prompt out to several models concurrently for comparison."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "polyroute.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}
