// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mys_social_graph::api::{self, AppState};
use mys_social_graph::config::{Config, LogFormat, StorageBackend};
use mys_social_graph::db::Database;
use mys_social_graph::media::UrlPrefixSigner;
use mys_social_graph::notify::LogNotifier;
use mys_social_graph::storage::{MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (reads .env if present)
    let config = Config::init()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mys_social_graph=debug"));
    match config.log.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
    info!("Initialized configuration");

    let store: Arc<dyn Store> = match config.storage {
        StorageBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            info!("Connected to database");
            Arc::new(db)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; nothing survives a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState {
        store,
        notifier: Arc::new(LogNotifier),
        media: Arc::new(UrlPrefixSigner::from_config(&config.media)),
        feed: config.feed,
    };

    tokio::select! {
        result = api::start_api_server(state) => {
            if let Err(e) = result {
                error!("API server error: {}", e);
                return Err(e);
            }
        }
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    info!("MySocial graph service shutdown complete");
    Ok(())
}
