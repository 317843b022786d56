//! # Xanthippe CLI Module
//!
//! ## Available Commands
//!
//! - `explore` - Run the exploration loop (optionally with the intake server)
//! - `serve` - Start the intake server only
//! - `forget` - Clear the screens under a button prefix
//! - `request` - Mark sequences for exploration
//! - `status` - Show coverage counts
//!
//! `forget`, `request` and `status` accept `--remote <url>`: when another
//! process holds the database, they go through that process's server.
//! - `dump` - List every record
//! - `decode` - Decode a hex frame
//! - `interactive` - Press buttons by name and echo each frame

mod commands;
mod remote;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xanthippe_core::XanthippeError;

pub use commands::*;
pub use remote::RemoteStore;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Xanthippe - calculator display mapper
///
/// Presses button sequences on a calculator, reads its LCD off the
/// backplane lines, and records the screen reached by every sequence.
#[derive(Parser, Debug)]
#[command(name = "xanthippe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the coverage database
    #[arg(short = 'D', long, global = true, default_value = "xanthippe.db")]
    pub database: PathBuf,

    /// Path to the TOML configuration file
    #[arg(short = 'c', long, global = true, default_value = "xanthippe.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Intake server of the process holding the database, used when the
    /// file is locked (e.g. http://127.0.0.1:8080)
    #[arg(short = 'r', long, global = true)]
    pub remote: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the exploration loop until Ctrl-C, exhaustion, or --count targets
    Explore {
        /// Stop after this many targets
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Also serve the intake endpoint on this address (host:port)
        #[arg(short, long)]
        serve: Option<String>,
    },

    /// Start the intake server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Forget every screen reached through a prefix of button names
    Forget {
        /// Button names, e.g. `2 +`
        #[arg(required = true)]
        names: Vec<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Mark comma-separated symbol sequences (and their prefixes) as requested
    Request {
        /// Sequences, e.g. `TCbi,jj`
        sequences: String,
    },

    /// Show coverage counts
    Status,

    /// List every record with its decoded screen
    Dump,

    /// Decode and render a 14-byte frame
    Decode {
        /// Frame bytes in hex, spaces allowed
        hex: String,
    },

    /// Press buttons by name and echo every observed frame
    Interactive,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), XanthippeError> {
    let config = AppConfig::load(&cli.config)?;
    let json_mode = cli.json_mode;
    let remote = cli.remote.as_deref();

    match cli.command {
        Some(Commands::Explore { count, serve }) => {
            cmd_explore(&cli.database, config, count, serve, json_mode).await
        }
        Some(Commands::Serve { host, port }) => {
            cmd_serve(&cli.database, &config, &host, port).await
        }
        Some(Commands::Forget { names, yes }) => {
            cmd_forget(&cli.database, remote, &config, &names, yes).await
        }
        Some(Commands::Request { sequences }) => {
            cmd_request(&cli.database, remote, &config, &sequences, json_mode).await
        }
        Some(Commands::Dump) => cmd_dump(&cli.database, json_mode),
        Some(Commands::Decode { hex }) => cmd_decode(&hex, json_mode),
        Some(Commands::Interactive) => cmd_interactive(&config),
        Some(Commands::Status) | None => cmd_status(&cli.database, remote, json_mode).await,
    }
}
