//! Platform-specific configuration paths.
//!
//! - **User config**: `~/.config/depgraph/` (Linux),
//!   `~/Library/Application Support/depgraph/` (macOS), `%APPDATA%\depgraph\`
//!   (Windows)
//! - **Project config**: `depgraph.toml` in the working directory
//!
//! # Example
//!
//! ```rust,no_run
//! use depgraph_config::paths;
//!
//! if let Some(path) = paths::find_config(None) {
//!     println!("Using config at: {:?}", path);
//! }
//! ```

use std::path::{Path, PathBuf};

/// Application name used for directory paths.
const APP_NAME: &str = "depgraph";

/// File name inside the user config directory.
const CONFIG_FILE: &str = "config.toml";

/// File name looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "depgraph.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the path of the user configuration file.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Finds the configuration file to load.
///
/// Searches in the following order:
/// 1. `explicit`, if given (returned only if it is a file)
/// 2. `depgraph.toml` in the current directory
/// 3. The user configuration file
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }
    find_config_in(Path::new("."), &default_config_path())
}

fn find_config_in(dir: &Path, user_path: &Path) -> Option<PathBuf> {
    let project = dir.join(PROJECT_CONFIG_FILE);
    if project.is_file() {
        return Some(project);
    }
    user_path.is_file().then(|| user_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_user_config_dir() {
        let dir = user_config_dir();
        assert!(dir.to_string_lossy().contains("depgraph"));
        assert_eq!(default_config_path().parent(), Some(dir.as_path()));
    }

    #[test]
    fn test_find_explicit_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        assert_eq!(find_config(Some(&path)), None);

        fs::write(&path, "").unwrap();
        assert_eq!(find_config(Some(&path)), Some(path));
    }

    #[test]
    fn test_project_config_wins_over_user_config() {
        let project_dir = TempDir::new().unwrap();
        let user_dir = TempDir::new().unwrap();
        let user_path = user_dir.path().join(CONFIG_FILE);

        assert_eq!(find_config_in(project_dir.path(), &user_path), None);

        fs::write(&user_path, "").unwrap();
        assert_eq!(find_config_in(project_dir.path(), &user_path), Some(user_path.clone()));

        let project_path = project_dir.path().join(PROJECT_CONFIG_FILE);
        fs::write(&project_path, "").unwrap();
        assert_eq!(find_config_in(project_dir.path(), &user_path), Some(project_path));
    }
}
