//! Site scaffolding for `pagesmith init`.
//!
//! Creates a new site that builds out of the box:
//!
//! ```text
//! my-site/
//! ├── config.json
//! ├── build/
//! ├── src/
//! │   ├── pages/
//! │   │   └── index.md
//! │   └── posts/
//! └── themes/
//!     └── default/
//!         └── page.html
//! ```

use crate::build::{BUILD_DIR, PAGES_DIR};
use crate::config::{self, DEFAULT_THEME, SiteConfig};
use crate::render::{DEFAULT_LAYOUT, TEMPLATE_EXTENSION, THEMES_DIR};
use crate::store::{self, StoreError};
use maud::{DOCTYPE, Markup, html};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directories created under the site root.
const SITE_DIRS: &[&str] = &[BUILD_DIR, PAGES_DIR, "src/posts"];

const SAMPLE_PAGE: &str = "---
title: Home
layout: page
order: 0
mainnav: true
---
# Welcome

This page lives in `src/pages/index.md`. Edit it and run `pagesmith build`.
";

#[derive(Error, Debug)]
pub enum InitError {
    #[error("cannot create site in an existing location: {0}")]
    AlreadyExists(PathBuf),
    #[error("could not create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write config: {0}")]
    Config(#[from] StoreError),
}

/// Create a new site at `root`, which must be missing or an empty directory.
pub fn init_site(root: &Path) -> Result<(), InitError> {
    if !is_empty_or_missing(root) {
        return Err(InitError::AlreadyExists(root.to_path_buf()));
    }

    let theme_dir = root.join(THEMES_DIR).join(DEFAULT_THEME);
    for dir in SITE_DIRS.iter().map(|d| root.join(d)).chain([theme_dir.clone()]) {
        fs::create_dir_all(&dir).map_err(|source| InitError::Io { path: dir, source })?;
    }

    config::save_config(root, &SiteConfig::default())?;
    write_file(
        &theme_dir.join(format!("{DEFAULT_LAYOUT}.{TEMPLATE_EXTENSION}")),
        default_layout().into_string().as_bytes(),
    )?;
    write_file(&root.join(PAGES_DIR).join("index.md"), SAMPLE_PAGE.as_bytes())?;
    Ok(())
}

fn is_empty_or_missing(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), InitError> {
    store::write_atomic(path, bytes).map_err(|source| InitError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// The stock `page` layout. Template tags pass through maud untouched;
/// `content` arrives as a safe value and is not escaped again.
pub fn default_layout() -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                meta name="author" content="{{ page_author }}";
                title { "{{ page_title }} | {{ site_title }}" }
            }
            body {
                header {
                    a href="{{ site_url }}" { "{{ site_title }}" }
                }
                main {
                    "{{ content }}"
                }
                footer {
                    "{{ site_author }}"
                }
            }
        }
    }
}
