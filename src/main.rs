// src/main.rs
//
// =============================================================================
// WORKSHOPNET: COMMANDER & ENTRY POINT (v 0.3 )
// =============================================================================
//
// Command-line front end over the engine.
//
// One SQLite file holds both the network records and the resource registry;
// the registry is the census the engine synchronizes from.
//
// Every command prints pretty JSON on stdout. Logs go to stderr
// (RUST_LOG, default "info").

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use workshopnet::core::parse_identity;
use workshopnet::{EngineConfig, ResourceKind, ResourceRegistry, WorkshopNet};

// ============================================================================
// 1. CLI DEFINITION
// ============================================================================

#[derive(Parser)]
#[command(
    name = "workshopnet",
    version,
    about = "Petri-net resource engine for workshops"
)]
struct Cli {
    /// SQLite database file (overrides the config file).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// YAML engine configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Network name (overrides the config file).
    #[arg(long, global = true)]
    network: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the network from scratch and seed it from the registry.
    Init,
    /// Delete the network.
    Reset,
    /// Marking, enabled transitions and recent history.
    State,
    /// Element counts and enabled transition names.
    Info,
    /// Token distribution next to the registry counts.
    Summary,
    /// All places with their token counts.
    Places,
    /// All transitions with their enablement.
    Transitions,
    /// Fire a transition (uuid or name).
    Fire { transition: String },
    /// Check whether a transition is enabled (uuid or name).
    Enabled { transition: String },
    /// Overwrite mapped places from the registry.
    Sync,
    /// Administratively enable a transition, or disable it with --off.
    Toggle {
        transition: String,
        #[arg(long)]
        off: bool,
    },
    /// Manage registry records.
    Resource {
        #[command(subcommand)]
        action: ResourceAction,
    },
}

#[derive(Subcommand)]
enum ResourceAction {
    /// Register a record: resource add worker ana available
    Add {
        kind: String,
        name: String,
        status: String,
    },
    SetStatus {
        kind: String,
        id: String,
        status: String,
    },
    Remove {
        kind: String,
        id: String,
    },
    /// Per-status counts for one kind, or all kinds.
    Counts { kind: Option<String> },
    List { kind: String },
}

// ============================================================================
// 2. ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config(&cli)?;
    let registry = Arc::new(
        ResourceRegistry::open(&config.db_path)
            .with_context(|| format!("opening registry at {:?}", config.db_path))?,
    );

    if let Commands::Resource { action } = &cli.command {
        return run_resource(&registry, action);
    }

    let engine = WorkshopNet::open(config, registry.clone()).context("opening engine store")?;
    let network = engine.default_network().to_string();

    match &cli.command {
        Commands::Init => {
            let id = engine.initialize_network(&network).await?;
            print_json(&serde_json::json!({ "network": network, "state_id": id }))
        }
        Commands::Reset => {
            engine.reset_network(&network).await?;
            print_json(&serde_json::json!({ "network": network, "reset": true }))
        }
        Commands::State => print_json(&engine.current_state(&network).await?),
        Commands::Info => print_json(&engine.network_info(&network).await?),
        Commands::Summary => print_json(&engine.system_summary(&network).await?),
        Commands::Places => print_json(&engine.places(&network).await?),
        Commands::Transitions => print_json(&engine.transitions(&network).await?),
        Commands::Fire { transition } => {
            let id = resolve(&engine, &network, transition).await?;
            print_json(&engine.fire(&network, &id).await)
        }
        Commands::Enabled { transition } => {
            let id = resolve(&engine, &network, transition).await?;
            let enabled = engine.is_transition_enabled(&network, &id).await?;
            print_json(&serde_json::json!({ "transition": id, "enabled": enabled }))
        }
        Commands::Sync => print_json(&engine.synchronize(&network).await?),
        Commands::Toggle { transition, off } => {
            let id = resolve(&engine, &network, transition).await?;
            engine.set_transition_enabled(&network, &id, !off).await?;
            print_json(&serde_json::json!({ "transition": id, "enabled": !off }))
        }
        Commands::Resource { .. } => Ok(()),
    }
}

// ============================================================================
// 3. HELPERS
// ============================================================================

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(db) = &cli.db {
        config = config.with_db_path(db);
    }
    if let Some(network) = &cli.network {
        config = config.with_network(network);
    }
    config.validate()?;
    Ok(config)
}

/// Accepts either a transition uuid or its name.
async fn resolve(engine: &WorkshopNet, network: &str, raw: &str) -> Result<String> {
    if let Ok(id) = parse_identity(raw) {
        return Ok(id);
    }
    let view = engine
        .find_transition(network, raw)
        .await
        .with_context(|| format!("resolving transition '{}'", raw))?;
    Ok(view.id)
}

fn run_resource(registry: &ResourceRegistry, action: &ResourceAction) -> Result<()> {
    match action {
        ResourceAction::Add { kind, name, status } => {
            let kind = ResourceKind::parse(kind)?;
            let id = registry.add(kind, name, status)?;
            print_json(&serde_json::json!({ "kind": kind, "id": id }))
        }
        ResourceAction::SetStatus { kind, id, status } => {
            registry.set_status(ResourceKind::parse(kind)?, id, status)?;
            print_json(&serde_json::json!({ "id": id, "status": status }))
        }
        ResourceAction::Remove { kind, id } => {
            registry.remove(ResourceKind::parse(kind)?, id)?;
            print_json(&serde_json::json!({ "id": id, "removed": true }))
        }
        ResourceAction::Counts { kind: Some(kind) } => {
            print_json(&registry.count_by_status(ResourceKind::parse(kind)?)?)
        }
        ResourceAction::Counts { kind: None } => {
            let mut all = serde_json::Map::new();
            for kind in ResourceKind::ALL {
                all.insert(
                    kind.as_str().to_string(),
                    serde_json::to_value(registry.count_by_status(kind)?)?,
                );
            }
            print_json(&all)
        }
        ResourceAction::List { kind } => print_json(&registry.list(ResourceKind::parse(kind)?)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
