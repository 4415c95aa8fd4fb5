//! Project scaffolding for `docsmith new`.
//!
//! ```text
//! <dir>/
//! ├── docsmith.toml
//! └── docs/
//!     └── index.md
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::embed::new::{CONFIG_TOML, INDEX_MD};
use crate::log;
use crate::utils::path::resolve_path;

/// Create a project in `name` (relative to the cwd), or in the cwd itself.
pub fn new_project(name: Option<&Path>, config_name: &Path) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current working directory")?;
    let dir = match name {
        Some(name) => resolve_path(name, &cwd),
        None => cwd,
    };
    create_project(&dir, config_name)
}

/// Write the config and a welcome page into `dir`.
///
/// Refuses to touch a directory that already has a config file; never
/// overwrites an existing `docs/index.md`.
pub fn create_project(dir: &Path, config_name: &Path) -> Result<()> {
    let config_path = dir.join(config_name);
    if config_path.exists() {
        bail!("Project already exists: {}", config_path.display());
    }

    let docs_dir = dir.join("docs");
    fs::create_dir_all(&docs_dir)
        .with_context(|| format!("Failed to create {}", docs_dir.display()))?;

    log!("new"; "writing config file: {}", config_path.display());
    fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let index = docs_dir.join("index.md");
    if index.exists() {
        log!("new"; "keeping existing {}", index.display());
    } else {
        log!("new"; "writing initial docs: {}", index.display());
        fs::write(&index, INDEX_MD)
            .with_context(|| format!("Failed to write {}", index.display()))?;
    }

    Ok(())
}
