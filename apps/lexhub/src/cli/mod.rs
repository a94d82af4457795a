//! # LexHub CLI Module
//!
//! This module implements the CLI interface for LexHub.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `modules` - List registered modules and their requirements
//! - `query` - Run a query against one entity
//! - `mutate` - Create, update, upsert or delete a record
//! - `search` - Rank records of one entity against a term
//! - `data` - Fetch a module's shaped data for a user

mod commands;

use crate::config::ConfigError;
use clap::{Parser, Subcommand};
use lexhub_core::HubError;
use std::path::PathBuf;
use thiserror::Error;

pub use commands::*;

// =============================================================================
// ERRORS
// =============================================================================

/// Anything a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// LexHub - centralized data access for legal practice modules
#[derive(Parser, Debug)]
#[command(name = "lexhub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the record database
    #[arg(short = 'D', long, global = true, default_value = "lexhub.redb")]
    pub database: PathBuf,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "lexhub.toml")]
    pub config: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (lost on exit)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// List registered modules
    Modules,

    /// Query records of one entity
    Query {
        /// Entity name (e.g. Case)
        entity: String,

        /// Equality filter, repeatable (field=value)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Relation path to join, repeatable (e.g. client)
        #[arg(short, long = "relation")]
        relations: Vec<String>,

        /// Maximum records returned
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Apply a mutation
    Mutate {
        /// Entity name
        entity: String,

        /// Operation: create, update, upsert or delete
        operation: String,

        /// Target record id (required for update, upsert and delete)
        #[arg(long)]
        id: Option<String>,

        /// Payload as a JSON object
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Search records of one entity
    Search {
        /// Entity name
        entity: String,

        /// Search term
        term: String,

        /// Allow approximate matches
        #[arg(long)]
        fuzzy: bool,

        /// Maximum hits returned
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Fetch a module's data as a user sees it
    Data {
        /// Module name (e.g. client-portal)
        module: String,

        /// Requesting user id
        #[arg(short, long)]
        user: String,

        /// Action label recorded for the visit
        #[arg(short, long, default_value = "view")]
        action: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;
    let target = Target {
        database: &cli.database,
        config: &cli.config,
        backend,
    };

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&target, &host, port).await,
        Some(Commands::Init { force }) => cmd_init(&target, force),
        Some(Commands::Modules) | None => cmd_modules(json_mode),
        Some(Commands::Query {
            entity,
            filters,
            relations,
            limit,
        }) => cmd_query(&target, json_mode, &entity, &filters, &relations, limit),
        Some(Commands::Mutate {
            entity,
            operation,
            id,
            data,
        }) => cmd_mutate(
            &target,
            json_mode,
            &entity,
            &operation,
            id,
            data.as_deref(),
        ),
        Some(Commands::Search {
            entity,
            term,
            fuzzy,
            limit,
        }) => cmd_search(&target, json_mode, &entity, &term, fuzzy, limit),
        Some(Commands::Data {
            module,
            user,
            action,
        }) => cmd_data(&target, &module, &user, &action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_filters_collect() {
        let cli = Cli::parse_from([
            "lexhub", "-B", "memory", "query", "Case", "-f", "status=ACTIVE", "-f",
            "priority=2", "-r", "client",
        ]);
        match cli.command {
            Some(Commands::Query {
                entity,
                filters,
                relations,
                limit,
            }) => {
                assert_eq!(entity, "Case");
                assert_eq!(filters, vec!["status=ACTIVE", "priority=2"]);
                assert_eq!(relations, vec!["client"]);
                assert_eq!(limit, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.backend, "memory");
    }

    #[test]
    fn defaults_apply_without_flags() {
        let cli = Cli::parse_from(["lexhub"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.database, PathBuf::from("lexhub.redb"));
        assert_eq!(cli.config, PathBuf::from("lexhub.toml"));
        assert_eq!(cli.backend, "redb");
    }
}
