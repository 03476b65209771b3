//! # Pagesmith
//!
//! A small static site generator: markdown pages with a front-matter header
//! go in `src/pages/`, HTML wrapped in a theme layout comes out in `build/`.
//! Only pages that changed since the last build are rendered again.
//!
//! # Site Layout
//!
//! ```text
//! my-site/
//! ├── config.json                  # title, url, author, theme (+ extra keys)
//! ├── .pagesmith-snapshot.json     # change tracking, written by `build`
//! ├── src/pages/
//! │   ├── index.md                 # → build/index.html
//! │   └── post.md                  # url: blog/post → build/blog/post/index.html
//! ├── themes/default/
//! │   ├── page.html                # layout named by `layout:` (default "page")
//! │   └── static/                  # copied verbatim to build/static/
//! └── build/
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | Untyped JSON key-value store and the atomic JSON write helpers |
//! | [`config`] | Typed `config.json` loading on top of [`store`] |
//! | [`document`] | Front-matter parsing into [`document::Metadata`] and body |
//! | [`snapshot`] | Change tracking: which pages are stale, what was built |
//! | [`render`] | Markdown to HTML and theme layout rendering |
//! | [`build`] | The incremental build tying the above together |
//! | [`init`] | New-site scaffolding |
//! | [`serve`] | Development HTTP server over `build/` |
//! | [`output`] | CLI output formatting and the [`output::Reporter`] |
//!
//! # Design Decisions
//!
//! ## Modification Times, Not Hashes
//!
//! Staleness is decided by comparing each page's modification time to the
//! one recorded at its last successful build. There is no dependency graph
//! between pages or between pages and layouts; `build --all` exists for the
//! cases where that matters.
//!
//! ## Per-Page Failure Isolation
//!
//! One broken page never blocks the rest of the site. Bad front matter or a
//! missing layout is recorded in the [`build::BuildReport`]; the page is left
//! out of the new snapshot and retried on the next build.
//!
//! ## Atomic Writes Everywhere
//!
//! Config, snapshot and rendered pages are all written to a temporary file
//! and renamed into place ([`store::write_atomic`]). An interrupted build
//! never leaves a truncated file behind.

pub mod build;
pub mod config;
pub mod document;
pub mod init;
pub mod output;
pub mod render;
pub mod serve;
pub mod snapshot;
pub mod store;
