//! Configuration file format and operations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use depgraph_core::ExecutorOptions;

use crate::error::ConfigError;
use crate::validation::{ValidationResult, validate_config};

/// Settings shared by the `depgraph` tools.
///
/// Every section and field is optional in the file; missing values take
/// their defaults.
///
/// # TOML Format
///
/// ```toml
/// [executor]
/// threads = 4
///
/// [logging]
/// filter = "info,depgraph_core=debug"
/// log_socket_values = true
///
/// [dot]
/// socket_colors = false
/// output_dir = "graphs"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Graph executor settings.
    pub executor: ExecutorConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
    /// DOT export settings.
    pub dot: DotConfig,
}

/// `[executor]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Threads used by one evaluation. `0` uses every available core.
    pub threads: usize,
}

impl ExecutorConfig {
    /// Executor options for these settings.
    pub fn options(&self) -> ExecutorOptions {
        match self.threads {
            0 => ExecutorOptions::available_parallelism(),
            n => ExecutorOptions::with_threads(n),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` env-filter directives, used when `RUST_LOG` is not set.
    pub filter: String,
    /// Log every value passing through a socket during evaluation.
    pub log_socket_values: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            log_socket_values: false,
        }
    }
}

/// `[dot]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DotConfig {
    /// Color sockets by value type.
    pub socket_colors: bool,
    /// Directory DOT files are written to when no output path is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            socket_colors: true,
            output_dir: None,
        }
    }
}

impl Config {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|e| e.in_file(path))?;
        config.validate().map_err(|e| ConfigError::from(e).in_file(path))?;
        Ok(config)
    }

    /// Load the file found by [`find_config`](crate::find_config), or the
    /// defaults when there is none.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match crate::paths::find_config(explicit) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a configuration from a TOML string. Values are not validated.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let save_error = |source: std::io::Error| ConfigError::Save {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(save_error)?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(save_error)?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Path of `<stem>.dot` inside `dot.output_dir`, creating the directory.
    ///
    /// Returns `None` when no output directory is configured.
    pub fn dot_output_path(&self, stem: &str) -> Result<Option<PathBuf>, ConfigError> {
        let Some(dir) = &self.dot.output_dir else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::DotOutputDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Some(dir.join(format!("{stem}.dot"))))
    }

    /// Checks the values of every section.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_config(self)
    }

    /// Executor options for the `[executor]` section.
    pub fn executor_options(&self) -> ExecutorOptions {
        self.executor.options()
    }
}
