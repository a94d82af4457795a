//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::CliError;
use crate::adapters::ModuleRequest;
use crate::api::{self, AppState};
use crate::config::LexhubConfig;
use crate::events::{DEFAULT_BUS_CAPACITY, EventBus, spawn_event_logger};
use lexhub_core::{
    DataMutation, DataQuery, EventSink, FieldValue, Fields, MemoryStore, ModuleRegistry,
    MutationOp, MutationOptions, RecordStore, RedbStore,
};
use std::path::Path;
use std::sync::Arc;

/// Where a command reads its configuration and records from.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub database: &'a Path,
    pub config: &'a Path,
    pub backend: &'a str,
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(target: &Target<'_>, host: &str, port: u16) -> Result<(), CliError> {
    let config = LexhubConfig::load(target.config)?;
    let bus = EventBus::new(DEFAULT_BUS_CAPACITY);
    let _logger = spawn_event_logger(&bus);
    let state = AppState::build(&config, open_store(target)?, Arc::new(bus))?;

    println!("LexHub Data Hub Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", target.backend);
    println!("  Database: {:?}", target.database);
    println!("  Config:   {:?}", target.config);
    println!();
    println!("Endpoints:");
    println!("  GET  /health                       - Health check");
    println!("  GET  /metrics                      - Performance metrics");
    println!("  POST /query                        - Run a query");
    println!("  POST /mutate                       - Apply a mutation");
    println!("  POST /analytics                    - Run an aggregation");
    println!("  POST /relationships                - Record a relationship");
    println!("  POST /cache/clear                  - Clear cached entries");
    println!("  POST /modules/{{module}}/data        - Module data");
    println!("  POST /modules/{{module}}/mutate      - Module mutation");
    println!("  POST /modules/{{module}}/search      - Module search");
    println!("  POST /modules/{{module}}/analytics   - Module analytics");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await?;
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(target: &Target<'_>, force: bool) -> Result<(), CliError> {
    if target.backend != "redb" {
        println!("Backend '{}' keeps nothing on disk", target.backend);
        return Ok(());
    }
    if target.database.exists() {
        if !force {
            return Err(CliError::InvalidArgument(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(target.database)?;
    }

    RedbStore::open(target.database)?;
    println!("Initialized new redb database at {:?}", target.database);
    Ok(())
}

// =============================================================================
// MODULES COMMAND
// =============================================================================

/// List registered modules.
pub fn cmd_modules(json_mode: bool) -> Result<(), CliError> {
    let modules = ModuleRegistry::standard();

    if json_mode {
        let entries: Vec<_> = modules.iter().collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
        return Ok(());
    }

    println!("LexHub Modules");
    println!("==============");
    for module in modules.iter() {
        println!();
        println!("{}", module.module);
        println!("  Primary:     {}", module.primary.join(", "));
        println!("  Secondary:   {}", module.secondary.join(", "));
        println!("  Relations:   {}", module.relations.join(", "));
        println!("  Permissions: {}", module.permissions.join(", "));
        println!("  Cache:       {:?}", module.cache_strategy);
    }
    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Query records of one entity.
pub fn cmd_query(
    target: &Target<'_>,
    json_mode: bool,
    entity: &str,
    filters: &[String],
    relations: &[String],
    limit: Option<usize>,
) -> Result<(), CliError> {
    let state = load_state(target)?;

    let mut query = DataQuery::new(entity);
    for raw in filters {
        let (field, value) = parse_filter(raw)?;
        query = query.eq(field, value);
    }
    for relation in relations {
        query = query.relation(relation.as_str());
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }

    let records = state.hub.query(&query)?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).unwrap_or_default()
        );
        return Ok(());
    }

    println!("{} record(s) of {}", records.len(), entity);
    for record in &records {
        let label = record
            .text("title")
            .or_else(|| record.text("name"))
            .unwrap_or("-");
        println!("  {}  {}", record.id, label);
    }
    Ok(())
}

// =============================================================================
// MUTATE COMMAND
// =============================================================================

/// Apply a mutation.
pub fn cmd_mutate(
    target: &Target<'_>,
    json_mode: bool,
    entity: &str,
    operation: &str,
    id: Option<String>,
    data: Option<&str>,
) -> Result<(), CliError> {
    let operation: MutationOp = operation.parse()?;
    let payload: Fields = match data {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| CliError::InvalidArgument(format!("data must be a JSON object: {e}")))?,
        None => Fields::new(),
    };

    let state = load_state(target)?;
    let mut mutation = DataMutation::new(entity, operation, payload).with_options(
        MutationOptions {
            actor: Some("cli".to_string()),
            ..MutationOptions::default()
        },
    );
    mutation.id = id;

    let result = state.hub.mutate(&mutation)?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).unwrap_or_default()
        );
        return Ok(());
    }

    match result.record_id() {
        Some(record_id) => println!("{} {} {}", operation.as_str(), entity, record_id),
        None => println!("{} {}: done", operation.as_str(), entity),
    }
    Ok(())
}

// =============================================================================
// SEARCH COMMAND
// =============================================================================

/// Search records of one entity.
pub fn cmd_search(
    target: &Target<'_>,
    json_mode: bool,
    entity: &str,
    term: &str,
    fuzzy: bool,
    limit: usize,
) -> Result<(), CliError> {
    let state = load_state(target)?;
    let hits = state.hub.search(entity, term, fuzzy, limit)?;

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&hits).unwrap_or_default());
        return Ok(());
    }

    println!("{} hit(s) for '{}' in {}", hits.len(), term, entity);
    for hit in &hits {
        println!("  {:?}  {}", hit.rank, hit.record.id);
    }
    Ok(())
}

// =============================================================================
// DATA COMMAND
// =============================================================================

/// Print a module's shaped data for `user`.
pub fn cmd_data(
    target: &Target<'_>,
    module: &str,
    user: &str,
    action: &str,
) -> Result<(), CliError> {
    let state = load_state(target)?;
    let adapter = state.adapters.adapter(module)?;
    let request = ModuleRequest::new(user).with_action(action);
    let data = adapter.get_module_data(&request)?;

    println!("{}", serde_json::to_string_pretty(&data).unwrap_or_default());
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the record store for the selected backend.
pub fn open_store(target: &Target<'_>) -> Result<Arc<dyn RecordStore>, CliError> {
    match target.backend {
        "redb" => Ok(Arc::new(RedbStore::open(target.database)?)),
        "memory" => Ok(Arc::new(MemoryStore::new())),
        other => Err(CliError::InvalidArgument(format!(
            "unknown backend '{other}' (expected redb or memory)"
        ))),
    }
}

/// Config, store and hub stack for a one-shot command.
fn load_state(target: &Target<'_>) -> Result<AppState, CliError> {
    let config = LexhubConfig::load(target.config)?;
    let events: Arc<dyn EventSink> = Arc::new(EventBus::default());
    Ok(AppState::build(&config, open_store(target)?, events)?)
}

/// Split `field=value`, typing the value as bool, integer, float or text.
pub fn parse_filter(raw: &str) -> Result<(String, FieldValue), CliError> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidArgument(format!("filter '{raw}' is not field=value")))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "filter '{raw}' has no field"
        )));
    }

    let value = value.trim();
    let typed = if let Ok(b) = value.parse::<bool>() {
        FieldValue::Bool(b)
    } else if let Ok(i) = value.parse::<i64>() {
        FieldValue::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        FieldValue::Float(f)
    } else {
        FieldValue::text(value)
    };
    Ok((field.to_string(), typed))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn memory_target() -> Target<'static> {
        Target {
            database: Path::new("unused.redb"),
            config: Path::new("/nonexistent/lexhub.toml"),
            backend: "memory",
        }
    }

    #[test]
    fn filters_are_typed() {
        assert_eq!(
            parse_filter("status=ACTIVE").unwrap(),
            ("status".to_string(), FieldValue::text("ACTIVE"))
        );
        assert_eq!(
            parse_filter("priority = 2").unwrap(),
            ("priority".to_string(), FieldValue::Int(2))
        );
        assert_eq!(
            parse_filter("billable=true").unwrap().1,
            FieldValue::Bool(true)
        );
        assert_eq!(parse_filter("rate=1.5").unwrap().1, FieldValue::Float(1.5));
    }

    #[test]
    fn malformed_filters_are_rejected() {
        assert!(matches!(
            parse_filter("status"),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_filter("=x"),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let target = Target {
            backend: "file",
            ..memory_target()
        };
        assert!(matches!(
            open_store(&target),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unsupported_operation_fails_before_storage() {
        let err = cmd_mutate(&memory_target(), true, "Case", "archive", None, None).unwrap_err();
        assert!(matches!(err, CliError::Hub(e) if e.kind() == "unsupported_operation"));
    }

    #[test]
    fn init_refuses_existing_database_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("hub.redb");
        let target = Target {
            database: &db,
            config: Path::new("/nonexistent/lexhub.toml"),
            backend: "redb",
        };

        cmd_init(&target, false).unwrap();
        assert!(db.exists());
        assert!(cmd_init(&target, false).is_err());
        cmd_init(&target, true).unwrap();
    }

    #[test]
    fn query_against_unknown_entity_fails() {
        let err = cmd_query(&memory_target(), true, "Invoice", &[], &[], None).unwrap_err();
        assert!(matches!(err, CliError::Hub(e) if e.kind() == "entity_not_registered"));
    }
}
