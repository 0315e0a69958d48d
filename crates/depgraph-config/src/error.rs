//! Errors raised while loading, checking or writing depgraph settings.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::validation::ValidationError;

/// Why a configuration could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read config file '{path}': {source}")]
    Read {
        /// The config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The text is not TOML, or a field has the wrong type.
    #[error("{} is not a valid config: {source}", origin(.path.as_deref()))]
    Parse {
        /// The config file, `None` for inline text.
        path: Option<PathBuf>,
        /// Error reported by the TOML parser.
        source: toml::de::Error,
    },

    /// The config parsed, but the executor thread count or the logging
    /// filter cannot be used.
    #[error("{} has unusable values: {source}", origin(.path.as_deref()))]
    Invalid {
        /// The config file, `None` for a config built in memory.
        path: Option<PathBuf>,
        /// What is wrong with the values.
        source: ValidationError,
    },

    /// The config could not be written, or its directory not created.
    #[error("cannot save config file '{path}': {source}")]
    Save {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configured `dot.output_dir` cannot hold DOT files.
    #[error("cannot use DOT output directory '{path}': {source}")]
    DotOutputDir {
        /// The configured directory.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config could not be encoded as TOML.
    #[error("cannot encode config as TOML: {0}")]
    Encode(#[from] toml::ser::Error),
}

fn origin(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!("config file '{}'", path.display()),
        None => "inline config".to_string(),
    }
}

impl From<ValidationError> for ConfigError {
    fn from(source: ValidationError) -> Self {
        ConfigError::Invalid { path: None, source }
    }
}

impl ConfigError {
    /// Attaches the file the config came from, if the error does not name one.
    #[must_use]
    pub fn in_file(self, file: &Path) -> Self {
        match self {
            ConfigError::Parse { path: None, source } => ConfigError::Parse {
                path: Some(file.to_path_buf()),
                source,
            },
            ConfigError::Invalid { path: None, source } => ConfigError::Invalid {
                path: Some(file.to_path_buf()),
                source,
            },
            other => other,
        }
    }

    /// The validation failure behind an [`Invalid`](Self::Invalid) error.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            ConfigError::Invalid { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_thread_count_message_names_the_file() {
        let err = ConfigError::from(ValidationError::TooManyThreads { threads: 5000, max: 1024 })
            .in_file(Path::new("/etc/depgraph.toml"));
        assert_eq!(
            err.to_string(),
            "config file '/etc/depgraph.toml' has unusable values: executor.threads is 5000, at most 1024 are supported"
        );
        assert!(matches!(err.validation(), Some(ValidationError::TooManyThreads { threads: 5000, .. })));
    }

    #[test]
    fn test_inline_filter_error() {
        let err = ConfigError::from(ValidationError::EmptyFilter);
        assert_eq!(err.to_string(), "inline config has unusable values: logging filter is empty");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_in_file_keeps_existing_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::DotOutputDir {
            path: PathBuf::from("graphs"),
            source: io,
        }
        .in_file(Path::new("other.toml"));
        let msg = err.to_string();
        assert!(msg.starts_with("cannot use DOT output directory 'graphs'"), "got: {msg}");
        assert!(err.validation().is_none());
    }

    #[test]
    fn test_parse_error_points_at_file() {
        let source = toml::from_str::<toml::Value>("threads = ").unwrap_err();
        let err = ConfigError::Parse { path: None, source }.in_file(Path::new("depgraph.toml"));
        assert!(err.to_string().starts_with("config file 'depgraph.toml' is not a valid config"));
    }
}
