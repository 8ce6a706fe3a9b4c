//! Store configuration.
//!
//! Settings come from an environment-sectioned JSON file:
//!
//! ```json
//! {
//!   "development": { "dataDir": "./kanecta-data", "initialChunkId": "..." },
//!   "production": { "dataDir": "/var/lib/kanecta" }
//! }
//! ```
//!
//! The section is picked by `KANECTA_ENV` (default `development`) and the file
//! by `KANECTA_CONFIG` (default `config.json`). Keys missing from the section
//! keep their defaults, and a missing file yields the defaults outright.

use crate::errors::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const CONFIG_PATH_ENV: &str = "KANECTA_CONFIG";
pub const ENVIRONMENT_ENV: &str = "KANECTA_ENV";
const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_ENVIRONMENT: &str = "development";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Root of all persisted state.
    pub data_dir: PathBuf,
    /// Id of the chunk holding the outline tree.
    pub initial_chunk_id: Uuid,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./kanecta-data"),
            initial_chunk_id: Uuid::nil(),
        }
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>, initial_chunk_id: Uuid) -> Self {
        Self {
            data_dir: data_dir.into(),
            initial_chunk_id,
        }
    }

    pub fn from_env() -> StoreResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let environment =
            std::env::var(ENVIRONMENT_ENV).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
        Self::load(Path::new(&path), &environment)
    }

    pub fn load(path: &Path, environment: &str) -> StoreResult<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.to_string_lossy(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(StoreError::Config(format!(
                    "{}: {}",
                    path.to_string_lossy(),
                    error
                )))
            }
        };
        Self::from_json(&raw, environment)
    }

    pub fn from_json(raw: &str, environment: &str) -> StoreResult<Self> {
        let document: Value = serde_json::from_str(raw)
            .map_err(|error| StoreError::Config(format!("malformed config: {}", error)))?;
        let section = match document.get(environment) {
            Some(section) => section.clone(),
            None => {
                tracing::warn!(environment, "config has no section for environment, using defaults");
                return Ok(Self::default());
            }
        };
        serde_json::from_value(section).map_err(|error| {
            StoreError::Config(format!("invalid '{}' section: {}", environment, error))
        })
    }

    /// Sharded entity files live here.
    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join("data")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.data_dir.join("trash")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
