//! Site building.
//!
//! Build phases:
//! - **Prepare** - clean the site directory unless `--dirty`
//! - **Collect** - walk the docs directory, split markdown pages from assets
//! - **Render** - markdown to HTML pages and verbatim asset copies, in parallel
//! - **Finalize** - default `404.html`, summary
//!
//! # Output layout
//!
//! ```text
//! docs/index.md        → site/index.html
//! docs/guide/README.md → site/guide/index.html
//! docs/setup.md        → site/setup/index.html
//! docs/404.md          → site/404.html
//! docs/img/logo.png    → site/img/logo.png
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use anyhow::{Context, Result, anyhow, bail};
use jwalk::WalkDir;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use rayon::prelude::*;

use crate::{
    config::SiteConfig,
    debug,
    embed::build::{PAGE_HTML, PageVars},
    log,
    logger::ProgressLine,
    utils::{html::escape, plural::plural_count},
};

/// Outcome of a successful build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub pages: usize,
    pub assets: usize,
}

/// Files found in the docs directory, relative to it.
#[derive(Debug, Default)]
struct BuildFiles {
    pages: Vec<PathBuf>,
    assets: Vec<PathBuf>,
}

/// Build the whole site from `docs_dir` into `site_dir`.
///
/// Idempotent: running it twice over unchanged sources yields the same tree.
pub fn build_site(config: &SiteConfig, dirty: bool) -> Result<BuildReport> {
    let start = Instant::now();
    let docs_dir = &config.build.docs_dir;
    let site_dir = &config.build.site_dir;

    if !docs_dir.is_dir() {
        bail!("docs directory '{}' not found", docs_dir.display());
    }

    prepare_site_dir(site_dir, dirty)?;

    let files = collect_build_files(docs_dir);
    let progress = ProgressLine::new(&[
        ("markdown", files.pages.len()),
        ("assets", files.assets.len()),
    ]);

    let has_error = AtomicBool::new(false);
    let (pages, assets) = rayon::join(
        || {
            run_parallel(&files.pages, &has_error, |rel| {
                render_page(config, rel)?;
                progress.inc("markdown");
                Ok(())
            })
        },
        || {
            run_parallel(&files.assets, &has_error, |rel| {
                copy_asset(docs_dir, site_dir, rel)?;
                progress.inc("assets");
                Ok(())
            })
        },
    );
    pages?;
    assets?;
    progress.finish();

    write_default_404(config, &files)?;

    let report = BuildReport {
        pages: files.pages.len(),
        assets: files.assets.len(),
    };
    log!(
        "build";
        "built {} and {} in {:.2?}",
        plural_count(report.pages, "page"),
        plural_count(report.assets, "asset"),
        start.elapsed()
    );
    Ok(report)
}

/// Start from an empty site directory unless `dirty`.
fn prepare_site_dir(site_dir: &Path, dirty: bool) -> Result<()> {
    if !dirty && site_dir.exists() {
        debug!("build"; "cleaning {}", site_dir.display());
        fs::remove_dir_all(site_dir)
            .with_context(|| format!("Failed to clear site directory: {}", site_dir.display()))?;
    }
    fs::create_dir_all(site_dir)
        .with_context(|| format!("Failed to create site directory: {}", site_dir.display()))
}

/// Walk `docs_dir`, skipping hidden entries.
///
/// A `README.md` is dropped in favor of an `index.md` in the same directory,
/// since both map to the same `index.html`.
fn collect_build_files(docs_dir: &Path) -> BuildFiles {
    let mut files = BuildFiles::default();

    let entries = WalkDir::new(docs_dir)
        .skip_hidden(true)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(docs_dir) else {
            continue;
        };
        let rel = rel.to_path_buf();
        if is_markdown(&rel) {
            files.pages.push(rel);
        } else {
            files.assets.push(rel);
        }
    }

    files.pages.retain(|rel| {
        let shadowed = is_readme(rel) && docs_dir.join(rel.with_file_name("index.md")).is_file();
        if shadowed {
            log!("warning"; "ignoring {} in favor of index.md", rel.display());
        }
        !shadowed
    });

    files
}

/// Apply `task` to every path, stopping at the first failure anywhere.
fn run_parallel<F>(paths: &[PathBuf], has_error: &AtomicBool, task: F) -> Result<()>
where
    F: Fn(&Path) -> Result<()> + Sync,
{
    paths.par_iter().try_for_each(|rel| {
        if has_error.load(Ordering::Relaxed) {
            return Err(anyhow!("Aborted"));
        }
        task(rel.as_path()).map_err(|e| {
            has_error.store(true, Ordering::Relaxed);
            e.context(format!("{}", rel.display()))
        })
    })
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

fn is_readme(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.eq_ignore_ascii_case("readme.md"))
}

/// Where a markdown page lands, relative to the site directory.
fn page_output_path(rel: &Path) -> PathBuf {
    let stem = rel
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let parent = rel.parent().unwrap_or(Path::new(""));

    if stem == "index" || is_readme(rel) {
        parent.join("index.html")
    } else if stem == "404" && parent.as_os_str().is_empty() {
        PathBuf::from("404.html")
    } else {
        parent.join(stem).join("index.html")
    }
}

fn render_page(config: &SiteConfig, rel: &Path) -> Result<()> {
    let source = config.build.docs_dir.join(rel);
    let markdown = fs::read_to_string(&source)
        .with_context(|| format!("Failed to read {}", source.display()))?;

    let fallback_title = rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let page = render_markdown(&markdown, &fallback_title, &config.site.name);

    let dest = config.build.site_dir.join(page_output_path(rel));
    write_file(&dest, page.as_bytes())
}

/// Render a full HTML page: the markdown body inside the page shell.
///
/// The title is the text of the first `# heading`, or `fallback_title`.
fn render_markdown(markdown: &str, fallback_title: &str, site_name: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let events: Vec<Event<'_>> = Parser::new_ext(markdown, options).collect();
    let title = first_heading(&events).unwrap_or_else(|| fallback_title.to_string());

    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, events.into_iter());

    PAGE_HTML.render(&PageVars {
        site_name: escape(site_name).into_owned(),
        title: escape(&title).into_owned(),
        body,
    })
}

fn first_heading(events: &[Event<'_>]) -> Option<String> {
    let start = events.iter().position(|e| {
        matches!(e, Event::Start(Tag::Heading { level: HeadingLevel::H1, .. }))
    })?;

    let mut text = String::new();
    for event in &events[start + 1..] {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) | Event::InlineHtml(t) | Event::Html(t) => {
                text.push_str(t);
            }
            _ => {}
        }
    }
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn copy_asset(docs_dir: &Path, site_dir: &Path, rel: &Path) -> Result<()> {
    let dest = site_dir.join(rel);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(docs_dir.join(rel), &dest)
        .with_context(|| format!("Failed to copy to {}", dest.display()))?;
    Ok(())
}

/// Give the dev server and static hosts a not-found page when the docs lack one.
fn write_default_404(config: &SiteConfig, files: &BuildFiles) -> Result<()> {
    let has_custom = files
        .pages
        .iter()
        .any(|rel| page_output_path(rel) == Path::new("404.html"));
    if has_custom {
        return Ok(());
    }

    let page = render_markdown(
        "# 404\n\nPage not found.\n",
        "404",
        &config.site.name,
    );
    write_file(&config.build.site_dir.join("404.html"), page.as_bytes())
}

fn write_file(dest: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, content).with_context(|| format!("Failed to write {}", dest.display()))
}
