// Allow panic/unwrap/expect in tests (denied globally via Cargo.toml lints)
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result
    )
)]

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use ordersync::config::{config_path, load_config_from};
use ordersync::logging::{init_logging, parse_rotation, LogConfig, LOG_FILENAME};
use ordersync::{FileOrderStore, ItemId, OrderStore, ParentKey, ReorderCoordinator};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// ordersync - ordered sibling collections with conflict-free reordering
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory (default: `[storage] data_dir` or ~/.ordersync/data)
    #[arg(long, env = "ORDERSYNC_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: ~/.ordersync/config.toml)
    #[arg(long, env = "ORDERSYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable JSON log format
    #[arg(long, env = "ORDERSYNC_LOG_JSON", default_value = "false", global = true)]
    log_json: bool,

    /// Log rotation period: daily, hourly, or never
    #[arg(long, env = "ORDERSYNC_LOG_ROTATION", default_value = "daily", global = true)]
    log_rotation: String,

    /// Custom log directory (default: ~/.ordersync/logs)
    #[arg(long, env = "ORDERSYNC_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the items of a collection in order
    List {
        /// Collection key, e.g. `question:module-1`
        parent: ParentKey,
    },
    /// Append a new item at the end of a collection
    Append {
        parent: ParentKey,
        /// Item payload as JSON
        #[arg(default_value = "null")]
        payload: String,
    },
    /// Create a new item at a position
    Insert {
        parent: ParentKey,
        #[arg(allow_negative_numbers = true)]
        position: i64,
        #[arg(default_value = "null")]
        payload: String,
    },
    /// Delete an item
    Remove { item_id: String },
    /// Move an item to a new index within its collection
    Move {
        parent: ParentKey,
        item_id: String,
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },
    /// Renumber a collection to dense 0..N orders
    Compact { parent: ParentKey },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveReport {
    item_id: ItemId,
    outcome: String,
    items: Vec<ordersync::OrderedItem>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_payload(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).wrap_err_with(|| format!("payload is not valid JSON: {raw}"))
}

async fn run(command: Command, store: &FileOrderStore, coordinator: &ReorderCoordinator) -> Result<()> {
    match command {
        Command::List { parent } => print_json(&store.list_siblings(&parent).await?),
        Command::Append { parent, payload } => {
            let item = store.append(&parent, parse_payload(&payload)?).await?;
            print_json(&item)
        }
        Command::Insert {
            parent,
            position,
            payload,
        } => {
            let item = coordinator
                .insert_at(&parent, position, parse_payload(&payload)?)
                .await?;
            print_json(&item)
        }
        Command::Remove { item_id } => print_json(&store.remove(&ItemId::from(item_id)).await?),
        Command::Move {
            parent,
            item_id,
            index,
        } => {
            let item_id = ItemId::from(item_id);
            let outcome = coordinator.move_item(&parent, &item_id, index).await?;
            print_json(&MoveReport {
                item_id,
                outcome: format!("{outcome:?}"),
                items: store.list_siblings(&parent).await?,
            })
        }
        Command::Compact { parent } => {
            let writes = coordinator.compact(&parent).await?;
            print_json(&serde_json::json!({
                "writes": writes,
                "items": store.list_siblings(&parent).await?,
            }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let mut log_config = LogConfig {
        json_format: args.log_json,
        rotation: parse_rotation(&args.log_rotation),
        ..Default::default()
    };
    if let Some(dir) = args.log_dir {
        log_config.log_dir = dir;
    }
    let log_file = log_config.log_dir.join(LOG_FILENAME);
    if let Err(e) = init_logging(log_config) {
        eprintln!("Error: Failed to initialize logging: {e}");
        eprintln!("Logs: {}", log_file.display());
        return Err(e);
    }

    let config_file = args.config.unwrap_or_else(config_path);
    let config = load_config_from(&config_file).unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {e}");
        ordersync::OrderSyncConfig::default()
    });

    let data_dir = args
        .data_dir
        .unwrap_or_else(|| config.storage.resolve_data_dir());
    debug!(data_dir = %data_dir.display(), "Opening file store");

    let store = Arc::new(FileOrderStore::with_capacity(
        data_dir,
        config.feed.channel_capacity,
    ));
    let coordinator = ReorderCoordinator::new(store.clone(), config.reorder);

    run(args.command, &store, &coordinator).await
}
