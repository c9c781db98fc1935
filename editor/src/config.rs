use std::path::{Path, PathBuf};

use serde::Deserialize;
use xdat_core::executor::TaskExecutor;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "editor.toml";

/// Filter used when neither the configuration nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Editor configuration loaded from `editor.toml`.
///
/// Every key is optional:
///
/// ```toml
/// version_table = "versions.csv"
/// log_filter = "xdat_core=debug,info"
/// worker_thread = "xdat-worker"
/// prefs_file = "xdat-editor-prefs.toml"
/// task_timeout_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// External version table layered over the embedded one.
    pub version_table: Option<PathBuf>,
    pub log_filter: String,
    pub worker_thread: String,
    pub prefs_file: PathBuf,
    /// How long the command-line front end waits for a background job.
    pub task_timeout_secs: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            version_table: None,
            log_filter: DEFAULT_LOG_FILTER.into(),
            worker_thread: TaskExecutor::DEFAULT_THREAD_NAME.into(),
            prefs_file: "xdat-editor-prefs.toml".into(),
            task_timeout_secs: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Whether the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl EditorConfig {
    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Resolves the outcome of [`load`](Self::load), falling back to defaults.
    ///
    /// A missing file is expected and logged at info level; any other
    /// failure is a warning.
    pub fn or_default(result: Result<Self, ConfigError>) -> Self {
        match result {
            Ok(config) => config,
            Err(err) if err.is_not_found() => {
                log::info!("No configuration file ({err}), using defaults");
                Self::default()
            }
            Err(err) => {
                log::warn!("{err}; using defaults");
                Self::default()
            }
        }
    }

    /// Version table path resolved against the directory of the config file.
    pub fn version_table_path(&self, config_path: &Path) -> Option<PathBuf> {
        let table = self.version_table.as_ref()?;
        if table.is_absolute() {
            return Some(table.clone());
        }
        let base = config_path.parent().unwrap_or(Path::new(""));
        Some(base.join(table))
    }
}
