//! Configuration validation.
//!
//! Parsing only checks the shape of a file. [`validate_config`] checks the
//! values: a thread count the executor can use and a logging filter whose
//! levels exist.
//!
//! # Example
//!
//! ```rust
//! use depgraph_config::{Config, validate_config};
//!
//! let config = Config::default();
//! validate_config(&config).expect("defaults are valid");
//! ```

use thiserror::Error;

use crate::config::Config;

/// Largest accepted `executor.threads`.
pub const MAX_THREADS: usize = 1024;

/// Level names accepted after `=` in a filter directive.
const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `logging.filter` has no directives.
    #[error("logging filter is empty")]
    EmptyFilter,

    /// A filter directive names a level that does not exist.
    #[error("unknown level '{level}' in filter directive '{directive}'")]
    UnknownLevel {
        /// The whole directive.
        directive: String,
        /// The level part after `=`.
        level: String,
    },

    /// `executor.threads` is above [`MAX_THREADS`].
    #[error("executor.threads is {threads}, at most {max} are supported")]
    TooManyThreads {
        /// Configured thread count.
        threads: usize,
        /// Largest accepted count.
        max: usize,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Checks a `tracing` env-filter string such as `info,depgraph_core=debug`.
///
/// Directives without `=` name a target or a bare level and are accepted.
pub fn validate_filter(filter: &str) -> ValidationResult<()> {
    let directives: Vec<&str> = filter.split(',').map(str::trim).filter(|d| !d.is_empty()).collect();
    if directives.is_empty() {
        return Err(ValidationError::EmptyFilter);
    }
    for directive in directives {
        if let Some((_, level)) = directive.rsplit_once('=')
            && !LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            return Err(ValidationError::UnknownLevel {
                directive: directive.to_string(),
                level: level.to_string(),
            });
        }
    }
    Ok(())
}

/// Validates every section of `config`, collecting all errors.
pub fn validate_config(config: &Config) -> ValidationResult<()> {
    let mut errors = Vec::new();
    if config.executor.threads > MAX_THREADS {
        errors.push(ValidationError::TooManyThreads {
            threads: config.executor.threads,
            max: MAX_THREADS,
        });
    }
    if let Err(e) = validate_filter(&config.logging.filter) {
        errors.push(e);
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_levels() {
        assert!(validate_filter("info").is_ok());
        assert!(validate_filter("warn,depgraph_core=debug").is_ok());
        assert!(validate_filter("depgraph_relations").is_ok());
        assert!(validate_filter("depgraph_core=TRACE").is_ok());
        assert_eq!(validate_filter(" , "), Err(ValidationError::EmptyFilter));
        assert_eq!(
            validate_filter("info,depgraph_core=loud"),
            Err(ValidationError::UnknownLevel {
                directive: "depgraph_core=loud".to_string(),
                level: "loud".to_string(),
            })
        );
    }

    #[test]
    fn test_config_collects_errors() {
        let mut config = Config::default();
        assert!(validate_config(&config).is_ok());

        config.executor.threads = MAX_THREADS + 1;
        assert!(matches!(validate_config(&config), Err(ValidationError::TooManyThreads { .. })));

        config.logging.filter = String::new();
        match validate_config(&config) {
            Err(ValidationError::Multiple(errors)) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[1], ValidationError::EmptyFilter);
            }
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_multiple_display_joins_messages() {
        let err = ValidationError::Multiple(vec![
            ValidationError::EmptyFilter,
            ValidationError::TooManyThreads { threads: 2000, max: 1024 },
        ]);
        assert_eq!(
            err.to_string(),
            "multiple validation errors: logging filter is empty; executor.threads is 2000, at most 1024 are supported"
        );
    }
}
