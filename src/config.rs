//! Site configuration module.
//!
//! Handles loading `config.json` from the site root into a typed
//! [`SiteConfig`]. The file is read through the untyped [`Store`] and then
//! converted, so the JSON parsing rules are shared with every other persisted
//! document.
//!
//! ## Config File
//!
//! ```json
//! {
//!     "title": "My Site",
//!     "url": "https://example.com",
//!     "author": "Ada Lovelace",
//!     "theme": "default",
//!     "tagline": "anything else is passed to templates"
//! }
//! ```
//!
//! The four known keys must be strings when present. `theme` defaults to
//! `"default"`; the other known keys default to empty. Unknown keys are kept
//! in [`SiteConfig::extra`] and exposed to templates as `site_<key>`.

use crate::store::{Store, StoreError};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file at the site root.
pub const CONFIG_FILENAME: &str = "config.json";

/// Theme used when `config.json` does not name one.
pub const DEFAULT_THEME: &str = "default";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
    #[error("invalid value in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
}

/// Site-wide settings from `config.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub title: String,
    pub url: String,
    pub author: String,
    pub theme: String,
    /// Keys not listed above.
    pub extra: Map<String, Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            url: String::new(),
            author: String::new(),
            theme: DEFAULT_THEME.to_string(),
            extra: Map::new(),
        }
    }
}

impl SiteConfig {
    /// Build a typed config from an untyped store.
    ///
    /// Known keys are removed from the store; what remains becomes `extra`.
    pub fn from_store(mut store: Store) -> Result<Self, StoreError> {
        let title = store.get_string("title")?;
        let url = store.get_string("url")?;
        let author = store.get_string("author")?;
        let theme = match store.get_string("theme")? {
            t if t.is_empty() => DEFAULT_THEME.to_string(),
            t => t,
        };
        for key in ["title", "url", "author", "theme"] {
            store.remove(key);
        }
        Ok(Self {
            title,
            url,
            author,
            theme,
            extra: store.into_map(),
        })
    }

    /// Flatten back into a store.
    pub fn to_store(&self) -> Store {
        let mut store = Store::new();
        store.set("title", self.title.as_str());
        store.set("url", self.url.as_str());
        store.set("author", self.author.as_str());
        store.set("theme", self.theme.as_str());
        for (key, value) in &self.extra {
            store.set(key.as_str(), value.clone());
        }
        store
    }

    /// Scalar `extra` values rendered as text for the template context.
    ///
    /// Objects, arrays and nulls have no sensible inline rendering and are
    /// skipped.
    pub fn extra_scalars(&self) -> impl Iterator<Item = (&str, String)> {
        self.extra.iter().filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.as_str(), text))
        })
    }
}

/// Path of the config file for a site root.
pub fn config_path(site_root: &Path) -> PathBuf {
    site_root.join(CONFIG_FILENAME)
}

/// Load `config.json` from the site root.
pub fn load_config(site_root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = config_path(site_root);
    let store = Store::load(&path).map_err(|source| ConfigError::Load {
        path: path.clone(),
        source,
    })?;
    SiteConfig::from_store(store).map_err(|source| ConfigError::Invalid { path, source })
}

/// Write `config` to `config.json` in the site root.
pub fn save_config(site_root: &Path, config: &SiteConfig) -> Result<(), StoreError> {
    config.to_store().save(&config_path(site_root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_theme_is_default() {
        assert_eq!(SiteConfig::default().theme, "default");
    }

    #[test]
    fn load_config_reads_known_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.json"),
            r#"{"title": "Home", "url": "https://x.org", "author": "Ada", "theme": "dark"}"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.title, "Home");
        assert_eq!(config.url, "https://x.org");
        assert_eq!(config.author, "Ada");
        assert_eq!(config.theme, "dark");
        assert!(config.extra.is_empty());
    }

    #[test]
    fn load_config_keeps_unknown_keys_as_extra() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.json"),
            r#"{"url": "u", "tagline": "hello", "year": 2014, "nav": [1]}"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.theme, DEFAULT_THEME);
        assert_eq!(config.extra.len(), 3);

        let scalars: Vec<(&str, String)> = config.extra_scalars().collect();
        assert_eq!(
            scalars,
            vec![("tagline", "hello".to_string()), ("year", "2014".to_string())]
        );
    }

    #[test]
    fn load_config_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Load { .. })
        ));
    }

    #[test]
    fn load_config_malformed_json_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.json"), "{ \"url\": ").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Load { .. })
        ));
    }

    #[test]
    fn load_config_wrong_type_is_invalid() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.json"), r#"{"author": 12}"#).unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn save_then_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut config = SiteConfig {
            title: "Notes".into(),
            url: "https://notes.example".into(),
            author: "Grace".into(),
            ..SiteConfig::default()
        };
        config.extra.insert("tagline".into(), Value::from("short"));

        save_config(tmp.path(), &config).unwrap();
        assert_eq!(load_config(tmp.path()).unwrap(), config);
    }
}
