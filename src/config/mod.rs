//! Site configuration management for `docsmith.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [site], [build], [serve]
//! ├── error          # ConfigError
//! ├── util           # config file search, URL path extraction
//! └── mod.rs         # SiteConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section   | Purpose                                           |
//! |-----------|---------------------------------------------------|
//! | `[site]`  | Site name and public URL (mount path)             |
//! | `[build]` | Source docs and output directories                |
//! | `[serve]` | Development server (address, watch, timings)      |

mod error;
pub mod section;
mod util;

pub use error::ConfigError;
pub use section::{BuildSectionConfig, ServeConfig, SiteSectionConfig, WatcherMode};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::cli::{BuildArgs, Cli, Commands};
use crate::log;
use crate::utils::path::{absolutize, resolve_path, route::normalize_mount_path};
use util::{extract_url_path, find_config_file};

/// Root configuration structure representing docsmith.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory, the parent of the config file
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub site: SiteSectionConfig,

    #[serde(default)]
    pub build: BuildSectionConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Find `docsmith.toml` upward from the cwd, load it and apply CLI options.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let Some(config_path) = find_config_file(&cwd, &cli.config) else {
            bail!(ConfigError::Validation(format!(
                "config file '{}' not found, run 'docsmith new' to create a project",
                cli.config.display()
            )));
        };

        let mut config = Self::from_path(&config_path)?;
        config.finalize(&config_path, &cwd);
        config.apply_command_options(cli, &cwd);
        config.validate()?;
        Ok(config)
    }

    /// Re-read the config file before a rebuild.
    ///
    /// `[site]` changes apply. `[build]` and `[serve]` stay as loaded, since
    /// the running server keeps its directories and its socket.
    pub fn reload(&self) -> Result<Self> {
        let mut fresh = Self::from_path(&self.config_path)?;
        fresh.finalize(&self.config_path, &self.root);

        if fresh.build.docs_dir != self.build.docs_dir
            || fresh.build.site_dir != self.build.site_dir
        {
            log!("warning"; "docs_dir and site_dir changes take effect after a restart");
        }

        fresh.build = self.build.clone();
        fresh.serve = self.serve.clone();
        fresh.validate()?;
        Ok(fresh)
    }

    /// Load configuration from file path, warning about unknown fields.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "ignoring unknown fields in {}: {}", display_path, fields.join(", "));
    }

    /// Anchor every configured path at the config file's directory.
    fn finalize(&mut self, config_path: &Path, cwd: &Path) {
        self.config_path = resolve_path(config_path, cwd);
        self.root = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());

        let root = self.root.clone();
        self.build.docs_dir = resolve_path(&self.build.docs_dir, &root);
        self.build.site_dir = resolve_path(&self.build.site_dir, &root);
        self.serve.watch = self
            .serve
            .watch
            .iter()
            .map(|p| resolve_path(p, &root))
            .collect();
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// CLI flags win over the config file. Paths given on the command line
    /// are relative to the cwd.
    fn apply_command_options(&mut self, cli: &Cli, cwd: &Path) {
        match &cli.command {
            Commands::Build { build_args } => self.apply_build_args(build_args),
            Commands::Serve {
                build_args,
                interface,
                port,
                no_livereload,
                watch,
            } => {
                self.apply_build_args(build_args);
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                if *no_livereload {
                    self.serve.livereload = false;
                }
                self.serve
                    .watch
                    .extend(watch.iter().map(|p| resolve_path(p, cwd)));
            }
            Commands::New { .. } => {}
        }
    }

    fn apply_build_args(&mut self, args: &BuildArgs) {
        self.build.dirty = args.dirty && !args.clean;
    }

    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // derived values
    // ========================================================================

    /// URL prefix the site is served under: the path of `site.url`, or `/`.
    pub fn mount_path(&self) -> String {
        let path = self
            .site
            .url
            .as_deref()
            .and_then(extract_url_path)
            .unwrap_or_default();
        normalize_mount_path(&path)
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Reject layouts that would make a build destroy its own sources.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let docs = absolutize(&self.build.docs_dir);
        let site = absolutize(&self.build.site_dir);

        if !docs.is_dir() {
            return Err(ConfigError::Validation(format!(
                "docs directory '{}' does not exist",
                docs.display()
            )));
        }
        if site == docs || docs.starts_with(&site) {
            return Err(ConfigError::Validation(
                "docs_dir must not be inside site_dir".into(),
            ));
        }
        if site.starts_with(&docs) {
            return Err(ConfigError::Validation(
                "site_dir must not be inside docs_dir".into(),
            ));
        }
        if let Some(url) = &self.site.url
            && extract_url_path(url).is_none()
        {
            return Err(ConfigError::Validation(format!(
                "site.url '{url}' is not a valid URL"
            )));
        }

        self.serve.validate()
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

/// Parse config, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SiteConfig {
    let (parsed, ignored) = SiteConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
