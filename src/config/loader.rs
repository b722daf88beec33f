//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;
use crate::net::tls::TlsError;

/// Error type for everything that can stop the proxy before it binds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} doesn't exist")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// Load the configuration file at `path`.
///
/// Only the JSON shape is checked here; semantic checks happen when the
/// route table is built.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let path = expand_home(path);
    if !path.exists() {
        return Err(ConfigError::NotFound(path));
    }

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;

    let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "Configuration file parsed");
    Ok(config)
}
