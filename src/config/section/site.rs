//! `[site]` section configuration.
//!
//! ```toml
//! [site]
//! name = "My Docs"                          # Shown in every page title
//! url = "https://example.github.io/project" # Path becomes the serve mount path
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSectionConfig {
    pub name: String,

    /// Public URL; its path component (`/project/`) is where the dev server
    /// mounts the site.
    pub url: Option<String>,
}

impl Default for SiteSectionConfig {
    fn default() -> Self {
        Self {
            name: "My Docs".into(),
            url: None,
        }
    }
}
