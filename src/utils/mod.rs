//! Shared helpers.
//!
//! - `html` - escaping for generated pages
//! - `mime` - content types by file extension
//! - `path` - filesystem and URL path normalization
//! - `plural` - count + noun formatting for log lines

pub mod html;
pub mod mime;
pub mod path;
pub mod plural;
