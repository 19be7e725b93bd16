//! Nube Bridge CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run bridge database migrations
//! nb-cli migrate
//!
//! # Backfill one store
//! nb-cli sync products --store-id 42
//! nb-cli sync all --store-id 42
//!
//! # Inspect a store's upstream profile and registered webhooks
//! nb-cli store info --store-id 42
//! nb-cli webhooks list --store-id 42
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sync` - Run a bulk sync and print the report
//! - `store info` - Show the upstream store profile
//! - `webhooks list` - List webhooks registered upstream

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use nube_bridge_core::StoreId;

mod commands;

#[derive(Parser)]
#[command(name = "nb-cli")]
#[command(author, version, about = "Nube Bridge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Run a bulk sync for one store
    Sync {
        #[command(subcommand)]
        target: SyncTarget,
    },
    /// Inspect a store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Inspect upstream webhook registrations
    Webhooks {
        #[command(subcommand)]
        action: WebhooksAction,
    },
}

#[derive(Subcommand)]
enum SyncTarget {
    /// Sync the product catalog (with tombstone sweep)
    Products {
        #[arg(short, long)]
        store_id: i64,
    },
    /// Sync orders
    Orders {
        #[arg(short, long)]
        store_id: i64,
    },
    /// Sync products, then orders
    All {
        #[arg(short, long)]
        store_id: i64,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Show the upstream store profile
    Info {
        #[arg(short, long)]
        store_id: i64,
    },
}

#[derive(Subcommand)]
enum WebhooksAction {
    /// List webhooks registered upstream
    List {
        #[arg(short, long)]
        store_id: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sync { target } => match target {
            SyncTarget::Products { store_id } => {
                commands::sync::products(StoreId::new(store_id)).await?;
            }
            SyncTarget::Orders { store_id } => {
                commands::sync::orders(StoreId::new(store_id)).await?;
            }
            SyncTarget::All { store_id } => commands::sync::all(StoreId::new(store_id)).await?,
        },
        Commands::Store { action } => match action {
            StoreAction::Info { store_id } => commands::store::info(StoreId::new(store_id)).await?,
        },
        Commands::Webhooks { action } => match action {
            WebhooksAction::List { store_id } => {
                commands::webhooks::list(StoreId::new(store_id)).await?;
            }
        },
    }
    Ok(())
}
