//! Context Graph demo binary
//!
//! Wires `user → quote → site` contexts to in-memory data sources, keeps
//! lists refreshed through `use`, then churns selections and prints the graph.

use anyhow::{Context as _, Result};
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use context_graph::config::{ConfigLoader, ContextDecl, GraphConfig};
use context_graph::logging::init_logging;
use context_graph::snapshot::GraphSnapshot;
use context_graph::{ContextGraph, DataSource, Generator, MemorySource, Subscription};
use owo_colors::OwoColorize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "context-graph", version, about = "Relational context selection demo")]
struct Cli {
    /// Workspace root holding context-graph.toml
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Explicit config file (overrides workspace lookup)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of selection rounds to run
    #[arg(long, default_value_t = 3)]
    rounds: usize,

    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ConfigLoader::load(&cli.workspace).context("loading workspace config")?,
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_logging(Some(&config.logging))?;

    if config.contexts.is_empty() {
        config.contexts = demo_contexts();
    }
    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    let graph = ContextGraph::from_config(&config)?;
    info!(contexts = config.contexts.len(), "Context graph ready");

    let users = Arc::new(MemorySource::new(vec![
        json!({"uuid": "u-1", "name": "Ada"}),
        json!({"uuid": "u-2", "name": "Grace"}),
    ]));
    let quotes = Arc::new(MemorySource::new(vec![
        json!({"uuid": "q-1", "userId": "u-1", "siteId": "s-1"}),
        json!({"uuid": "q-2", "userId": "u-2", "siteId": "s-2"}),
    ]));
    let sites = Arc::new(MemorySource::new(vec![
        json!({"uuid": "s-1", "label": "North"}),
        json!({"uuid": "s-2", "label": "South"}),
        json!({"uuid": "s-3", "label": "East"}),
    ]));

    let _listeners = attach_lists(&graph, &config, quotes.clone(), sites.clone())?;

    for round in 0..cli.rounds {
        switch_user(&graph, users.as_ref()).await?;
        select_site(&graph, sites.as_ref(), round).await?;
    }

    let snapshot = graph.snapshot();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

fn demo_contexts() -> Vec<ContextDecl> {
    vec![
        ContextDecl {
            name: "user".to_string(),
            rels: vec!["quote".to_string()],
            identifier: None,
        },
        ContextDecl {
            name: "quote".to_string(),
            rels: vec!["site".to_string()],
            identifier: None,
        },
        ContextDecl {
            name: "site".to_string(),
            rels: vec![],
            identifier: None,
        },
    ]
}

/// Keep the quote and site lists current, like the list widgets of a UI.
fn attach_lists(
    graph: &ContextGraph,
    config: &GraphConfig,
    quotes: Arc<MemorySource>,
    sites: Arc<MemorySource>,
) -> Result<Vec<Subscription>> {
    let mut subscriptions = Vec::new();
    for (name, source) in [("quote", quotes), ("site", sites)] {
        if !config.contexts.iter().any(|c| c.name == name) {
            continue;
        }
        let label = name.to_string();
        let subscription = graph.handle(name).using(
            Generator::all(source),
            move |items: Value| {
                let count = items.as_array().map_or(0, Vec::len);
                info!(context = %label, count, "List refreshed");
            },
            false,
        )?;
        subscriptions.push(subscription);
    }
    Ok(subscriptions)
}

/// Select the first user that is not the current one.
async fn switch_user(graph: &ContextGraph, users: &MemorySource) -> Result<()> {
    let all = users.all().await?;
    let id_field = users.id_field();
    let current = graph.current_or("user", all.first().cloned().unwrap_or(Value::Null), false);
    let next = all
        .iter()
        .find(|user| user.get(id_field) != current.get(id_field))
        .and_then(|user| user.get(id_field).cloned());

    if let Some(id) = next {
        let user = users.by_id(&id).await?;
        info!(user = %id, "Switching user");
        graph.handle("user").select(user)?;
    }
    Ok(())
}

async fn select_site(graph: &ContextGraph, sites: &MemorySource, round: usize) -> Result<()> {
    if sites.is_empty() {
        return Ok(());
    }
    let all = sites.all().await?;
    let Some(id) = all
        .get(round % sites.len())
        .and_then(|site| site.get(sites.id_field()).cloned())
    else {
        return Ok(());
    };
    let site = sites.by_id(&id).await?;
    info!(site = %id, "Selecting site");
    graph.handle("site").select(site)?;
    Ok(())
}

fn print_snapshot(snapshot: &GraphSnapshot) {
    println!(
        "{} {} (identifier: {})",
        "Context graph".bold(),
        snapshot.taken_at.dimmed(),
        snapshot.identifier.cyan()
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Context", "Relations", "Listeners", "Selected"]);

    for context in &snapshot.contexts {
        table.add_row(vec![
            context.name.clone(),
            context.rels.join(", "),
            context.listeners.to_string(),
            context
                .selected
                .as_ref()
                .map_or_else(|| "-".to_string(), Value::to_string),
        ]);
    }
    println!("{table}");
}
