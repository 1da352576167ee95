//! Command-line surface for the nestwork engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nestwork_engine::{load_registry, EngineConfig, NestedEntityEngine};
use nestwork_storage::SqliteStore;
use serde_json::Value;
use std::{fs, path::Path, path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "nestwork")]
#[command(about = "Nested-entity transactions against a SQLite file")]
pub struct Cli {
    /// SQLite database file (created if missing)
    #[arg(long, default_value = "nestwork.db")]
    pub db: PathBuf,

    /// Entity schema registry (TOML)
    #[arg(long)]
    pub schema: PathBuf,

    /// Engine configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a record and every nested child in one transaction
    Create { entity: String, file: PathBuf },

    /// Update a root record and apply its nested creates, updates and deletes
    UnitOfWork {
        entity: String,
        id: String,
        file: PathBuf,
    },

    /// Hard-delete one record
    Delete { entity: String, id: String },

    /// List every record of an entity
    List { entity: String },

    /// Run a raw SQL statement
    Exec {
        /// Wrap the statement in its own transaction
        #[arg(long)]
        transaction: bool,
        sql: String,
    },
}

fn read_document(path: &Path) -> Result<Value> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Builds the engine from the CLI's files.
pub fn open_engine(cli: &Cli) -> Result<NestedEntityEngine> {
    let registry = load_registry(&cli.schema)
        .with_context(|| format!("loading schema {}", cli.schema.display()))?;
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let store = SqliteStore::open(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;
    info!(
        "opened {} with {} entit(ies)",
        cli.db.display(),
        registry.len()
    );
    Ok(NestedEntityEngine::new(
        Arc::new(store),
        Arc::new(registry),
        config,
    ))
}

/// Runs one command and returns its JSON result.
pub async fn run(cli: &Cli) -> Result<Value> {
    let engine = open_engine(cli)?;
    let output = match &cli.command {
        Command::Create { entity, file } => {
            let document = read_document(file)?;
            engine.create_entity(entity, &document).await?
        }
        Command::UnitOfWork { entity, id, file } => {
            let document = read_document(file)?;
            let report = engine
                .unit_of_work(entity, &Value::String(id.clone()), &document)
                .await?;
            serde_json::to_value(report)?
        }
        Command::Delete { entity, id } => {
            let affected = engine
                .delete_entity(entity, &Value::String(id.clone()))
                .await?;
            serde_json::json!({ "deleted": affected })
        }
        Command::List { entity } => Value::Array(engine.list_entities(entity).await?),
        Command::Exec { transaction, sql } => engine.run_command(sql, *transaction).await?,
    };
    Ok(output)
}
