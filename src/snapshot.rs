//! Change tracking for incremental builds.
//!
//! Rendering is cheap per page but a site with hundreds of pages still
//! rewrites hundreds of files on every build. This module lets the build
//! skip pages whose source has not changed since the last successful build.
//!
//! # Design
//!
//! A page is identified by its file name inside `src/pages/` and compared
//! by modification time only. There is no dependency graph: editing a theme
//! template does not invalidate any page (use `build --all` for that).
//!
//! A page is **stale** when either:
//! 1. it has no record in the snapshot (new page), or
//! 2. its record's modification time differs from the file's current one.
//!
//! Timestamps are compared as structured [`SystemTime`] values, so equal
//! means equal to the nanosecond as reported by the filesystem.
//!
//! ## Snapshot lifecycle
//!
//! The snapshot is taken once, at the end of a build, from the full current
//! listing. It is replaced wholesale rather than patched, so pages deleted
//! from `src/pages/` simply stop appearing. Pages that failed to build keep
//! whatever record they had before (or none), which makes them stale again
//! on the next run.
//!
//! ## Storage
//!
//! The snapshot is a JSON file at `<site>/.pagesmith-snapshot.json`. A
//! missing, corrupt, or wrong-version file means "no prior snapshot" and the
//! next build rebuilds everything.

use crate::store::{self, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the snapshot file within the site root.
pub const SNAPSHOT_FILENAME: &str = ".pagesmith-snapshot.json";

/// Version of the snapshot format. Bump this to force a full rebuild when
/// the format changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("could not read directory {path}: {source}")]
    Listing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write snapshot: {0}")]
    Save(#[from] StoreError),
}

/// A source file as seen in the current directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub modified: SystemTime,
}

impl Entry {
    pub fn new(name: impl Into<String>, modified: SystemTime) -> Self {
        Self {
            name: name.into(),
            modified,
        }
    }
}

/// The modification time a page had when it was last built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub modified: SystemTime,
}

/// On-disk set of records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub version: u32,
    pub records: Vec<Record>,
}

impl Snapshot {
    /// Load from the site root. `None` when there is no usable snapshot.
    pub fn load(site_root: &Path) -> Option<Self> {
        let path = snapshot_path(site_root);
        if !path.exists() {
            return None;
        }
        let snapshot: Self = match store::read_json(&path) {
            Ok(s) => s,
            Err(err) => {
                warn!("ignoring unreadable snapshot {}: {err}", path.display());
                return None;
            }
        };
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                "ignoring snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            );
            return None;
        }
        Some(snapshot)
    }

    /// Replace the snapshot file in the site root.
    pub fn save(&self, site_root: &Path) -> Result<(), StoreError> {
        store::write_json(&snapshot_path(site_root), self)
    }

    fn by_name(&self) -> HashMap<&str, &Record> {
        self.records.iter().map(|r| (r.name.as_str(), r)).collect()
    }
}

/// Decides which pages need rebuilding and records what was built.
#[derive(Debug)]
pub struct Tracker {
    site_root: PathBuf,
    previous: Option<Snapshot>,
}

impl Tracker {
    /// Open the tracker for a site, loading any prior snapshot.
    pub fn open(site_root: &Path) -> Self {
        Self {
            site_root: site_root.to_path_buf(),
            previous: Snapshot::load(site_root),
        }
    }

    /// Whether a usable snapshot from an earlier build exists.
    pub fn has_snapshot(&self) -> bool {
        self.previous.is_some()
    }

    /// Regular files in `dir` whose name ends with `extension`, sorted by name.
    pub fn list_sources(dir: &Path, extension: &str) -> Result<Vec<Entry>, SnapshotError> {
        let listing_err = |source: io::Error| SnapshotError::Listing {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = Vec::new();
        for item in fs::read_dir(dir).map_err(listing_err)? {
            let item = item.map_err(listing_err)?;
            let name = item.file_name().to_string_lossy().into_owned();
            if !name.ends_with(extension) {
                continue;
            }
            let meta = item.metadata().map_err(listing_err)?;
            if !meta.is_file() {
                continue;
            }
            entries.push(Entry::new(name, meta.modified().map_err(listing_err)?));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// The subset of `listing` that must be rebuilt, in listing order.
    pub fn filter_stale(&self, listing: &[Entry], rebuild_all: bool) -> Vec<Entry> {
        let previous = match &self.previous {
            Some(p) if !rebuild_all => p,
            _ => return listing.to_vec(),
        };
        let records = previous.by_name();
        listing
            .iter()
            .filter(|entry| match records.get(entry.name.as_str()) {
                None => {
                    debug!("{} is new", entry.name);
                    true
                }
                Some(record) if record.modified != entry.modified => {
                    debug!("{} was modified", entry.name);
                    true
                }
                Some(_) => false,
            })
            .cloned()
            .collect()
    }

    /// Build the snapshot that follows a build over `listing`.
    ///
    /// Entries named in `failed` keep their previous record, if any.
    pub fn next_snapshot(&self, listing: &[Entry], failed: &HashSet<String>) -> Snapshot {
        let previous = self
            .previous
            .as_ref()
            .map(Snapshot::by_name)
            .unwrap_or_default();
        let records = listing
            .iter()
            .filter_map(|entry| {
                if failed.contains(&entry.name) {
                    previous.get(entry.name.as_str()).map(|r| (*r).clone())
                } else {
                    Some(Record {
                        name: entry.name.clone(),
                        modified: entry.modified,
                    })
                }
            })
            .collect();
        Snapshot {
            version: SNAPSHOT_VERSION,
            records,
        }
    }

    /// Write the snapshot for a finished build. Returns whether the file
    /// changed.
    pub fn persist(
        &mut self,
        listing: &[Entry],
        failed: &HashSet<String>,
    ) -> Result<bool, SnapshotError> {
        let next = self.next_snapshot(listing, failed);
        if self.previous.as_ref() == Some(&next) {
            return Ok(false);
        }
        next.save(&self.site_root)?;
        self.previous = Some(next);
        Ok(true)
    }
}

/// Resolve the snapshot path for a site root.
pub fn snapshot_path(site_root: &Path) -> PathBuf {
    site_root.join(SNAPSHOT_FILENAME)
}
