use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration, read from `config.yml` or `config.toml`.
/// Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file. Defaults to `<data dir>/flowmig/flowmig.db`.
    pub path: Option<PathBuf>,
    /// Overrides the dialect used for the tracking table DDL.
    pub dialect: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("flowmig")
                .join("flowmig.db")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Bare or `schema.table` qualified name.
    pub tracking_table: String,
    pub schema: Option<String>,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            tracking_table: "mig_applied_migrations".to_string(),
            schema: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
