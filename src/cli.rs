use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seekgate")]
#[command(author, version, about = "Byte-range video server with seek throttling")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the video server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Issue a signed token granting access to one resource
    SignToken {
        /// Resource name the token is valid for
        resource: String,

        /// Lifetime of the token in seconds
        #[arg(long, default_value = "3600")]
        ttl_secs: u64,
    },

    /// Display version information
    Version,

    /// Generate a random API key for programmatic access
    GenerateApiKey,

    /// Generate a random secret for signing resource tokens
    GenerateSecret,
}
