pub mod app;
pub mod modules;
pub mod server;

use std::path::PathBuf;
use std::sync::Arc;

use config_db::Database;
use config_engine::{Registry, Store};

const DEFAULT_PORT: u16 = 8080;

/// Open the database, create module tables and register every module.
pub fn init_foundation() -> Result<(Store, PathBuf), anyhow::Error> {
    load_dotenv();
    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;

    let db_path = dir.join("config.db");
    tracing::info!("Opening database at {}", db_path.display());
    let db = Database::open(&db_path)?;
    modules::migrate(&db)?;

    let mut registry = Registry::new();
    modules::register_all(&mut registry);
    tracing::info!(modules = registry.len(), "Config registry ready");

    Ok((Store::new(db, Arc::new(registry)), dir))
}

/// Port for the admin server (`CONFIG_ADMIN_PORT`, default 8080).
pub fn server_port() -> u16 {
    match std::env::var("CONFIG_ADMIN_PORT") {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid CONFIG_ADMIN_PORT {v:?}, using {DEFAULT_PORT}");
            DEFAULT_PORT
        }),
        Err(_) => DEFAULT_PORT,
    }
}

/// Determine the data directory for the application.
fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CONFIG_ADMIN_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config-admin")
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}
