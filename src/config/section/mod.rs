//! Configuration section definitions.
//!
//! | Module  | TOML Section | Purpose                          |
//! |---------|--------------|----------------------------------|
//! | `site`  | `[site]`     | Site name and public URL         |
//! | `build` | `[build]`    | Docs source and site output dirs |
//! | `serve` | `[serve]`    | Development server               |

mod build;
mod serve;
mod site;

pub use build::BuildSectionConfig;
pub use serve::{ServeConfig, WatcherMode};
pub use site::SiteSectionConfig;
