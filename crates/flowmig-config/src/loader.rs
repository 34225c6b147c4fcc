use std::path::Path;

use flowmig_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::model::AppConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML or TOML file, picked by extension.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).inspect_err(|e| {
            warn!("failed to read config {}: {e}", path.display());
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = Self::parse(&contents, ext)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::load(path),
            None => {
                debug!("no config file given, using defaults");
                Ok(AppConfig::default())
            }
        }
    }

    pub fn parse(contents: &str, ext: &str) -> Result<AppConfig> {
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => {
                toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
            }
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }
}
