//! `[build]` section configuration.
//!
//! ```toml
//! [build]
//! docs_dir = "docs"   # Markdown sources (relative to the config file)
//! site_dir = "site"   # Generated site (relative to the config file)
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    pub docs_dir: PathBuf,

    pub site_dir: PathBuf,

    /// Keep stale output instead of cleaning `site_dir` first (`--dirty`).
    #[serde(skip)]
    pub dirty: bool,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            docs_dir: "docs".into(),
            site_dir: "site".into(),
            dirty: false,
        }
    }
}
