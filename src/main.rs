//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Schema registry main binary

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schema_registry::{
    RegistryConfig, SchemaRegistry, Store, SCHEMA_REGISTRY_NAME, SCHEMA_REGISTRY_VERSION,
};

#[derive(Parser)]
#[command(name = SCHEMA_REGISTRY_NAME)]
#[command(about = "Schema registry for event-streaming pipelines")]
#[command(version = SCHEMA_REGISTRY_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the schema registry server
    Serve {
        /// Configuration file path
        #[arg(short, long, default_value = "config/schema-registry.toml")]
        config: PathBuf,

        /// Bind host override
        #[arg(long)]
        host: Option<String>,

        /// Bind port override
        #[arg(long)]
        port: Option<u16>,

        /// Database URL override
        #[arg(long)]
        database_url: Option<String>,
    },

    /// Run database migrations and exit
    Migrate {
        /// Configuration file path
        #[arg(short, long, default_value = "config/schema-registry.toml")]
        config: PathBuf,

        /// Database URL override
        #[arg(long)]
        database_url: Option<String>,
    },
}

fn load_config(path: &PathBuf) -> RegistryConfig {
    if path.exists() {
        match RegistryConfig::from_file(path) {
            Ok(config) => {
                info!("configuration loaded from {}", path.display());
                config
            }
            Err(e) => {
                error!("failed to load configuration from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        warn!(
            "configuration file not found: {}, using defaults",
            path.display()
        );
        match RegistryConfig::load_with_defaults() {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load default configuration: {}", e);
                std::process::exit(1);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            database_url,
        } => {
            let mut config = load_config(&config);

            // CLI arguments override the file
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = port {
                config.api.port = port;
            }
            if let Some(url) = database_url {
                config.storage.database_url = url;
            }

            if let Err(e) = config.validate() {
                error!("configuration validation failed: {}", e);
                std::process::exit(1);
            }

            let service = SchemaRegistry::connect(config).await?;
            service.serve().await?;
            service.shutdown().await;
        }

        Commands::Migrate {
            config,
            database_url,
        } => {
            let mut config = load_config(&config);
            if let Some(url) = database_url {
                config.storage.database_url = url;
            }

            let store = Store::connect(&config.storage).await?;
            store.migrate().await?;
            store.close().await;
            info!("database migrations applied");
        }
    }

    Ok(())
}
