//! Configuration for the depgraph tools.
//!
//! One TOML file holds the executor, logging and DOT export settings. The
//! file is looked up next to the working directory first, then in the user
//! configuration directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use depgraph_config::{Config, default_config_path};
//!
//! let mut config = Config::load_or_default(None).unwrap();
//! config.executor.threads = 4;
//! config.save(default_config_path()).unwrap();
//! ```

mod config;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

/// Configuration validation.
pub mod validation;

pub use config::{Config, DotConfig, ExecutorConfig, LoggingConfig};
pub use error::ConfigError;
pub use paths::{default_config_path, find_config, user_config_dir};
pub use validation::{MAX_THREADS, ValidationError, ValidationResult, validate_config, validate_filter};
