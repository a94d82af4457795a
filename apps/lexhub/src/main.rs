//! # LexHub - Data Hub Server
//!
//! The main binary for the LexHub centralized data-access layer.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for hub operations
//! - Module adapters for the practice-management modules
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      apps/lexhub (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │   CLI       │    │   HTTP API  │    │ Module Adapters  │    │
//! │  │  (clap)     │    │   (axum)    │    │ Context Provider │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                    ┌───────────────┐                           │
//! │                    │  lexhub-core  │                           │
//! │                    │ (THE LOGIC)   │                           │
//! │                    └───────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! lexhub server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! lexhub modules
//! lexhub mutate Client create -d '{"name":"Acme"}'
//! lexhub query Case -f status=ACTIVE -r client
//! lexhub data client-portal -u u-42
//! ```

use clap::Parser;
use lexhub::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // LEXHUB_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("LEXHUB_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lexhub=info,lexhub_core=info,tower_http=debug".into());

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

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the LexHub startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗     ███████╗██╗  ██╗██╗  ██╗██╗   ██╗██████╗
  ██║     ██╔════╝╚██╗██╔╝██║  ██║██║   ██║██╔══██╗
  ██║     █████╗   ╚███╔╝ ███████║██║   ██║██████╔╝
  ██║     ██╔══╝   ██╔██╗ ██╔══██║██║   ██║██╔══██╗
  ███████╗███████╗██╔╝ ██╗██║  ██║╚██████╔╝██████╔╝
  ╚══════╝╚══════╝╚═╝  ╚═╝╚═╝  ╚═╝ ╚═════╝ ╚═════╝

  Legal Data Hub v{}

  Cached • Permission-scoped • Audited
"#,
        env!("CARGO_PKG_VERSION")
    );
}
