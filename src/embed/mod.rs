//! Embedded static resources.
//!
//! - `template` - Template types for typed variable injection
//! - `serve` - Dev server templates (livereload.js)
//! - `build` - Site build templates (page.html)
//! - `new` - Project scaffolding files
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{LIVERELOAD_JS, LivereloadVars};
//!
//! let js = LIVERELOAD_JS.render(&LivereloadVars { epoch, request_id });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};
    use crate::reload::Epoch;

    /// Variables for livereload.js template.
    pub struct LivereloadVars {
        /// Site version the page was rendered from.
        pub epoch: Epoch,
        /// Identifies the page instance in poll requests.
        pub request_id: Epoch,
    }

    impl TemplateVars for LivereloadVars {
        fn placeholders(&self) -> Vec<(&'static str, String)> {
            vec![
                ("__EPOCH__", self.epoch.to_string()),
                ("__REQUEST_ID__", self.request_id.to_string()),
            ]
        }
    }

    /// Browser-side poller injected into served HTML.
    pub const LIVERELOAD_JS: Template<LivereloadVars> =
        Template::new(include_str!("serve/livereload.js"));
}

pub mod build {
    use super::{Template, TemplateVars};

    /// Variables for page.html template.
    pub struct PageVars {
        pub site_name: String,
        pub title: String,
        pub body: String,
    }

    impl TemplateVars for PageVars {
        fn placeholders(&self) -> Vec<(&'static str, String)> {
            // Body last: rendered markdown may itself contain the placeholders.
            vec![
                ("__SITE_NAME__", self.site_name.clone()),
                ("__TITLE__", self.title.clone()),
                ("__BODY__", self.body.clone()),
            ]
        }
    }

    /// HTML shell wrapped around every rendered markdown page.
    pub const PAGE_HTML: Template<PageVars> =
        Template::new(include_str!("build/page.html"));
}

pub mod new {
    /// Default `docsmith.toml` written by `docsmith new`.
    pub const CONFIG_TOML: &str = include_str!("new/docsmith.toml");

    /// Default `docs/index.md` written by `docsmith new`.
    pub const INDEX_MD: &str = include_str!("new/index.md");
}
