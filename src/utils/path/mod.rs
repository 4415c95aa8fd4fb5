//! Path and URL utilities.
//!
//! Pure functions for path manipulation.
//!
//! - [`fs`]: Filesystem path normalization (`absolutize`, `resolve_path`)
//! - [`route`]: URL path handling for the dev server

pub mod fs;
pub mod route;

pub use fs::{absolutize, relative_to_cwd, resolve_path};
