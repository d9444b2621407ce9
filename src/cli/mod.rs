//! CLI module for the DSA question answering service.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Answer data structures and algorithms questions from a reference index.
#[derive(Debug, Parser)]
#[command(name = "dsa-rag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        default_value = "text",
        help = "Output format: text, json, or markdown"
    )]
    pub format: OutputFormat,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        short = 'c',
        global = true,
        env = "DSA_RAG_CONFIG",
        help = "Path to a TOML config file"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP answer service
    Serve(commands::ServeArgs),

    /// Answer a question locally or through a running server
    Ask(commands::AskArgs),

    /// Show the chunks retrieved for a query, without generation
    Search(commands::SearchArgs),

    /// Check configuration, index artifacts and a running server
    Status(commands::StatusArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
