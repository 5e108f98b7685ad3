use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "playcast-relay")]
#[command(author, version, about = "Collect a playcast feed and relay it live or delayed")]
pub struct Cli {
    /// Path to config file (default: ./stream.json)
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
    /// Bootstrap from upstream, then collect and serve until shutdown
    Run {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Collect fragments into the store without serving them
    Collect,

    /// Serve an existing store without collecting
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the delayed sync record for the stored feed
    Plan {
        /// Newest fragment to plan against (default: stored current pointer)
        #[arg(long)]
        current: Option<u64>,

        /// Delay in fragments (overrides config)
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Validate configuration file
    Validate,

    /// Display version information
    Version,
}
