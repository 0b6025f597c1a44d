//! Runtime configuration read from the environment
//!
//! | variable | default |
//! |---|---|
//! | `FIELDSYNC_API_URL` | `http://127.0.0.1:54321` |
//! | `FIELDSYNC_API_KEY` | empty |
//! | `FIELDSYNC_DB_PATH` | platform data dir, `fieldsync/local.db` |
//! | `FIELDSYNC_CONFIG` | none; TOML file with [`SyncConfig`] values |
//! | `FIELDSYNC_TECHNICIAN_ID` | none; skips job provisioning |

use crate::local_db::LocalDatabase;
use crate::shared::config::{ConfigError, SyncConfig};
use std::path::PathBuf;

/// Default backend URL
const DEFAULT_API_URL: &str = "http://127.0.0.1:54321";

/// Application configuration wrapper.
#[derive(Debug, Clone)]
pub struct Config {
    api_url: String,
    api_key: String,
    db_path: PathBuf,
    technician_id: Option<String>,
    sync: SyncConfig,
}

impl Config {
    /// Read the configuration from `FIELDSYNC_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env_var("FIELDSYNC_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(api_url));
        }

        let db_path = env_var("FIELDSYNC_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(LocalDatabase::default_path);

        let sync = match env_var("FIELDSYNC_CONFIG") {
            Some(path) => SyncConfig::from_toml_file(path)?,
            None => SyncConfig::default(),
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: env_var("FIELDSYNC_API_KEY").unwrap_or_default(),
            db_path,
            technician_id: env_var("FIELDSYNC_TECHNICIAN_ID"),
            sync,
        })
    }

    /// Backend base URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Location of the local store
    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Technician whose jobs are provisioned at startup
    pub fn technician_id(&self) -> Option<&str> {
        self.technician_id.as_deref()
    }

    /// Sync tunables
    pub fn sync(&self) -> &SyncConfig {
        &self.sync
    }
}

/// Non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
