//! Configuration file resolution and TOML loading
//!
//! Config file lookup follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`<config_dir>/playsync/config.toml`)
//! 4. System-wide file (`/etc/playsync/config.toml`, unix only)
//!
//! A missing config file is never fatal. Callers get `None` from
//! [`resolve_config_file`] and fall back to built-in defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PLAYSYNC_CONFIG";

/// Application directory name under the platform config dir
const APP_DIR: &str = "playsync";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit ANSI colors in log output
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: default_ansi(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ansi() -> bool {
    true
}

/// Resolve the config file to load.
///
/// Returns the first candidate that exists, in priority order. An explicit
/// CLI path or environment path that does not exist is reported with a
/// warning and skipped rather than treated as an error.
pub fn resolve_config_file(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        if path.exists() {
            debug!("Config file {:?} (from command line)", path);
            return Some(path.to_path_buf());
        }
        warn!("Config file {:?} given on command line does not exist", path);
    }

    // Priority 2: Environment variable
    if let Ok(value) = std::env::var(env_var_name) {
        let path = PathBuf::from(value);
        if path.exists() {
            debug!("Config file {:?} (from {})", path, env_var_name);
            return Some(path);
        }
        warn!("Config file {:?} from {} does not exist", path, env_var_name);
    }

    // Priority 3 and 4: platform locations
    default_config_candidates()
        .into_iter()
        .find(|candidate| candidate.exists())
}

/// Platform config file locations, most specific first
fn default_config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR).join(CONFIG_FILE_NAME));
    }

    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILE_NAME));
    }

    candidates
}

/// Read and parse a TOML file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;

    let value = toml::from_str(&content)?;
    info!("Loaded configuration from {:?}", path);
    Ok(value)
}

/// Load `T` from the resolved config file, or fall back to `T::default()`.
///
/// A config file that exists but fails to parse is an error.
pub fn load_or_default<T>(cli_arg: Option<&Path>, env_var_name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match resolve_config_file(cli_arg, env_var_name) {
        Some(path) => load_toml(&path),
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(T::default())
        }
    }
}
