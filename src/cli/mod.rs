//! Command-line interface module.
//!
//! - `args` - clap definitions
//! - `new` - `docsmith new`
//! - `build` - `docsmith build`, also the rebuild callback of the dev server
//! - `serve` - `docsmith serve`

mod args;
pub mod build;
pub mod new;
pub mod serve;

pub use args::{BuildArgs, Cli, Commands};
