//! Command-line interface

use clap::{Parser, Subcommand};

/// Availability and latency monitor for HTTP services
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Port to listen on, overriding PORT
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Verify storage credentials and tables, then print row counts
    CheckConfig,
}
