//! # Xanthippe - Calculator Explorer
//!
//! The main binary for the Xanthippe display mapper.
//!
//! This application provides:
//! - CLI interface for exploration and store maintenance
//! - HTTP intake server for requested sequences (axum-based)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/xanthippe (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐   │
//! │  │   CLI       │    │   Intake    │    │  Explore Loop    │   │
//! │  │  (clap)     │    │   (axum)    │    │  (blocking)      │   │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘   │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                   ┌─────────────────┐                          │
//! │                   │ xanthippe-core  │                          │
//! │                   │  (THE LOGIC)    │                          │
//! │                   └─────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Explore with the intake endpoint on port 8080
//! xanthippe explore --serve 127.0.0.1:8080
//!
//! # Store maintenance
//! xanthippe status
//! xanthippe forget 2 +
//! xanthippe decode "60 00 00 63 7a 00 00 00 00 00 00 00 00 00"
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xanthippe::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // XANTHIPPE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("XANTHIPPE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "xanthippe=info,xanthippe_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗  ██╗ █████╗ ███╗   ██╗████████╗██╗  ██╗██╗██████╗ ██████╗ ███████╗
  ╚██╗██╔╝██╔══██╗████╗  ██║╚══██╔══╝██║  ██║██║██╔══██╗██╔══██╗██╔════╝
   ╚███╔╝ ███████║██╔██╗ ██║   ██║   ███████║██║██████╔╝██████╔╝█████╗
   ██╔██╗ ██╔══██║██║╚██╗██║   ██║   ██╔══██║██║██╔═══╝ ██╔═══╝ ██╔══╝
  ██╔╝ ██╗██║  ██║██║ ╚████║   ██║   ██║  ██║██║██║     ██║     ███████╗
  ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝  ╚═══╝   ╚═╝   ╚═╝  ╚═╝╚═╝╚═╝     ╚═╝     ╚══════╝

  Calculator Display Mapper v{}

  Snoop • Press • Record
"#,
        env!("CARGO_PKG_VERSION")
    );
}
