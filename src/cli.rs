//! Command-line interface definition for Polyglot Messenger
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand};

use crate::config::TransportKind;
use crate::locale::Language;

/// Polyglot Messenger - multi-conversation assistant chat in the terminal
///
/// Keep several conversations with an AI assistant open at once, switch
/// between them, and search them by name, in English, Chinese or Urdu.
#[derive(Parser, Debug, Clone)]
#[command(name = "polyglot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Display language (en, zh, ur)
        #[arg(short, long)]
        language: Option<Language>,

        /// Override the transport from config
        #[arg(short, long, value_enum)]
        transport: Option<TransportKind>,
    },

    /// List supported display languages
    Languages,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
