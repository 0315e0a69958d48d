//! CLI command implementations.

pub mod config;
pub mod dot;
pub mod eval;
pub mod rig;

use std::path::Path;

use anyhow::Context as _;

/// Writes `text` to `path`, creating missing parent directories.
pub fn write_output(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
