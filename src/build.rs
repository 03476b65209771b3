//! Incremental site build.
//!
//! Ties the other modules together for one `build` invocation:
//!
//! ```text
//! config.json ──► SiteConfig
//! src/pages/*.md ──► listing ──► Tracker::filter_stale ──► stale pages
//!                                                           │
//!        ┌──────────────────────────────────────────────────┘
//!        ▼
//!   Document::parse ─► markdown_to_html ─► TemplateEngine::render ─► build/…
//!                                                           │
//!   Tracker::persist(full listing, failed pages) ◄──────────┘
//! ```
//!
//! ## Output layout
//!
//! | Front matter | Output |
//! |--------------|--------|
//! | no `url` | `build/<stem>.html` |
//! | `url: blog/first` | `build/blog/first/index.html` |
//! | `url: /` | `build/index.html` |
//!
//! ## Failure policy
//!
//! Only a bad `config.json` or theme name, an unreadable `src/pages/`, or a
//! failure to create an output directory aborts the build. Anything else that goes wrong
//! with a single page (bad front matter, missing layout, write error) is
//! recorded in the [`BuildReport`] and the build moves on. Failed pages are
//! left out of the new snapshot so the next build retries them.

use crate::config::{self, ConfigError, SiteConfig};
use crate::document::{Document, FrontMatterError};
use crate::output::Reporter;
use crate::render::{self, Context, RenderError, TemplateEngine, ThemeTemplates};
use crate::snapshot::{Entry, SnapshotError, Tracker};
use crate::store;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Source pages, relative to the site root.
pub const PAGES_DIR: &str = "src/pages";

/// Rendered output, relative to the site root.
pub const BUILD_DIR: &str = "build";

/// Only files with this suffix are treated as pages.
pub const PAGE_EXTENSION: &str = ".md";

/// Theme subdirectory copied verbatim to `build/static/`.
pub const STATIC_DIR: &str = "static";

/// Errors that abort the whole build.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Theme error: {0}")]
    Theme(#[from] RenderError),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("could not create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not copy theme assets: {0}")]
    Assets(#[from] walkdir::Error),
    #[error("could not copy {path}: {source}")]
    CopyAsset {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors confined to a single page.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("{0}")]
    MalformedFrontMatter(FrontMatterError),
    #[error("{0}")]
    Render(#[from] RenderError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("url '{0}' must be a relative path without '..'")]
    UnsafeUrl(String),
}

impl DocumentError {
    /// Short label for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedFrontMatter(_) => "malformed front matter",
            Self::Render(_) => "render",
            Self::Io { .. } => "io",
            Self::UnsafeUrl(_) => "unsafe url",
        }
    }
}

impl From<FrontMatterError> for DocumentError {
    fn from(err: FrontMatterError) -> Self {
        match err {
            FrontMatterError::Io { document, source } => Self::Io {
                path: PathBuf::from(document),
                source,
            },
            other => Self::MalformedFrontMatter(other),
        }
    }
}

/// Knobs for a single build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Ignore the snapshot and rebuild every page.
    pub rebuild_all: bool,
    /// Theme to use instead of the one in `config.json`.
    pub theme: Option<String>,
}

impl BuildOptions {
    pub fn theme_for<'a>(&'a self, config: &'a SiteConfig) -> &'a str {
        self.theme.as_deref().unwrap_or(&config.theme)
    }
}

/// Progress notifications emitted while building.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    Started { total: usize, stale: usize },
    PageBuilt { name: String, output: PathBuf },
    PageFailed { name: String, kind: &'static str, message: String },
    AssetsCopied { files: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPage {
    pub name: String,
    /// Path relative to the site root.
    pub output: PathBuf,
}

#[derive(Debug)]
pub struct DocumentFailure {
    pub name: String,
    pub error: DocumentError,
}

/// What a build did.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Pages in `src/pages/`.
    pub total: usize,
    /// Pages skipped because they were already up to date.
    pub fresh: usize,
    pub built: Vec<BuiltPage>,
    pub failures: Vec<DocumentFailure>,
    /// Files copied from the theme's `static/` directory.
    pub assets_copied: usize,
    pub snapshot_written: bool,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure(&self, name: &str) -> Option<&DocumentFailure> {
        self.failures.iter().find(|f| f.name == name)
    }
}

/// Build the site at `site_root` with the theme layouts on disk.
pub fn build(
    site_root: &Path,
    options: &BuildOptions,
    reporter: &Reporter,
) -> Result<BuildReport, BuildError> {
    let config = config::load_config(site_root)?;
    let templates = ThemeTemplates::new(site_root, options.theme_for(&config))?;
    build_with_engine(site_root, &config, &templates, options, reporter)
}

/// Build using a specific template engine (allows testing with a mock).
pub fn build_with_engine(
    site_root: &Path,
    config: &SiteConfig,
    engine: &impl TemplateEngine,
    options: &BuildOptions,
    reporter: &Reporter,
) -> Result<BuildReport, BuildError> {
    let pages_dir = site_root.join(PAGES_DIR);
    let build_dir = site_root.join(BUILD_DIR);
    let static_dir = render::theme_dir(site_root, options.theme_for(config))?.join(STATIC_DIR);

    let listing = Tracker::list_sources(&pages_dir, PAGE_EXTENSION)?;
    let mut tracker = Tracker::open(site_root);
    let stale = tracker.filter_stale(&listing, options.rebuild_all);

    reporter.event(&BuildEvent::Started {
        total: listing.len(),
        stale: stale.len(),
    });

    let mut report = BuildReport {
        total: listing.len(),
        fresh: listing.len() - stale.len(),
        ..BuildReport::default()
    };

    if !stale.is_empty() {
        create_dir(&build_dir)?;
    }

    for entry in &stale {
        match build_page(&pages_dir, &build_dir, entry, config, engine)? {
            Ok(output) => {
                let output = output
                    .strip_prefix(site_root)
                    .map(Path::to_path_buf)
                    .unwrap_or(output);
                reporter.event(&BuildEvent::PageBuilt {
                    name: entry.name.clone(),
                    output: output.clone(),
                });
                report.built.push(BuiltPage {
                    name: entry.name.clone(),
                    output,
                });
            }
            Err(error) => {
                reporter.event(&BuildEvent::PageFailed {
                    name: entry.name.clone(),
                    kind: error.kind(),
                    message: error.to_string(),
                });
                report.failures.push(DocumentFailure {
                    name: entry.name.clone(),
                    error,
                });
            }
        }
    }

    let failed: HashSet<String> = report.failures.iter().map(|f| f.name.clone()).collect();
    report.snapshot_written = tracker.persist(&listing, &failed)?;

    if static_dir.is_dir() {
        report.assets_copied = copy_static(&static_dir, &build_dir.join(STATIC_DIR))?;
        if report.assets_copied > 0 {
            reporter.event(&BuildEvent::AssetsCopied {
                files: report.assets_copied,
            });
        }
    }

    Ok(report)
}

/// Render one page. The outer error aborts the build, the inner one only
/// this page.
fn build_page(
    pages_dir: &Path,
    build_dir: &Path,
    entry: &Entry,
    config: &SiteConfig,
    engine: &impl TemplateEngine,
) -> Result<Result<PathBuf, DocumentError>, BuildError> {
    let doc = match Document::read(&pages_dir.join(&entry.name), entry.modified) {
        Ok(doc) => doc,
        Err(err) => return Ok(Err(err.into())),
    };
    let output = match output_path(build_dir, &doc) {
        Ok(path) => path,
        Err(err) => return Ok(Err(err)),
    };

    let content = render::markdown_to_html(&doc.body);
    let context = page_context(config, &doc, content);
    let html = match engine.render(&doc.metadata.layout, &context) {
        Ok(html) => html,
        Err(err) => return Ok(Err(err.into())),
    };

    if let Some(parent) = output.parent() {
        create_dir(parent)?;
    }
    Ok(store::write_atomic(&output, html.as_bytes())
        .map(|()| output.clone())
        .map_err(|source| DocumentError::Io {
            path: output,
            source,
        }))
}

/// Where a page is written.
///
/// An empty `url` gives a flat `<stem>.html`. Otherwise the url is trimmed
/// of surrounding slashes and what remains must be a plain relative path;
/// `/` alone maps to the site index.
pub fn output_path(build_dir: &Path, doc: &Document) -> Result<PathBuf, DocumentError> {
    let url = doc.metadata.url.trim();
    if url.is_empty() {
        return Ok(build_dir.join(format!("{}.html", doc.stem())));
    }
    let url = url.trim_matches('/');
    if url.is_empty() {
        return Ok(build_dir.join("index.html"));
    }
    let relative = Path::new(url);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(DocumentError::UnsafeUrl(doc.metadata.url.clone()));
    }
    Ok(build_dir.join(relative).join("index.html"))
}

/// Template values for one page.
///
/// Extra config keys go in first as `site_<key>` so they can never shadow
/// the fixed names.
pub fn page_context(config: &SiteConfig, doc: &Document, content: String) -> Context {
    let mut ctx = Context::new();
    for (key, value) in config.extra_scalars() {
        ctx.insert(format!("site_{key}"), value);
    }
    let meta = &doc.metadata;
    let fixed = [
        ("site_title", config.title.clone()),
        ("site_url", config.url.clone()),
        ("site_author", config.author.clone()),
        ("page_title", meta.title.clone()),
        ("page_author", meta.author.clone()),
        ("page_slug", meta.slug.clone()),
        ("page_url", meta.url.clone()),
        ("page_layout", meta.layout.clone()),
        ("page_order", meta.order.to_string()),
        ("page_mainnav", meta.mainnav.to_string()),
        ("content", content),
    ];
    for (key, value) in fixed {
        ctx.insert(key.to_string(), value);
    }
    ctx
}

fn create_dir(path: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(path).map_err(|source| BuildError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy a directory tree verbatim, skipping files already current in `dst`.
/// Returns the number of files copied.
fn copy_static(src: &Path, dst: &Path) -> Result<usize, BuildError> {
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            create_dir(&target)?;
        } else if !is_current(&entry.metadata()?, &target) {
            fs::copy(entry.path(), &target).map_err(|source| BuildError::CopyAsset {
                path: entry.path().to_path_buf(),
                source,
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// A copy is current when it has the source's length and is at least as new.
fn is_current(source: &fs::Metadata, target: &Path) -> bool {
    let Ok(existing) = fs::metadata(target) else {
        return false;
    };
    match (source.modified(), existing.modified()) {
        (Ok(src), Ok(dst)) => existing.len() == source.len() && dst >= src,
        _ => false,
    }
}
