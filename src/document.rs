//! Front-matter document model.
//!
//! A source page is plain markdown with an optional metadata header bounded
//! by two lines containing only `---`:
//!
//! ```text
//! ---
//! title: "Home"
//! layout: page
//! order: 0
//! mainnav: true
//! ---
//! # Hi
//! ```
//!
//! ## Parsing rules
//!
//! The parser is a single forward pass over the lines with a delimiter
//! counter:
//!
//! - A line whose trimmed content is exactly `---` bumps the counter.
//! - Between the first and second delimiter every line is `key: value`,
//!   split on the first colon. Both sides are trimmed and one layer of
//!   surrounding double quotes is stripped from the value. Unknown keys and
//!   lines without a key are ignored.
//! - After the second delimiter everything is body, verbatim.
//! - With fewer than two delimiters there is no header at all: metadata stays
//!   at its defaults and the whole text is body.
//!
//! `order` must be a base-10 integer; anything else is a
//! [`FrontMatterError::MalformedOrder`] naming the document. `mainnav` is true
//! only for the literal `true`.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

/// The delimiter line that opens and closes the header.
pub const DELIMITER: &str = "---";

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("value of 'order' must be an integer in '{document}', got '{value}'")]
    MalformedOrder { document: String, value: String },
    #[error("could not read '{document}': {source}")]
    Io {
        document: String,
        #[source]
        source: io::Error,
    },
}

/// Typed header fields. Every field is optional in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub layout: String,
    pub slug: String,
    pub url: String,
    pub mainnav: bool,
    pub order: i64,
}

impl Metadata {
    /// Apply one header line. Returns an error only for a malformed `order`.
    fn apply(&mut self, key: &str, value: &str, document: &str) -> Result<(), FrontMatterError> {
        match key {
            "title" => self.title = value.to_string(),
            "author" => self.author = value.to_string(),
            "layout" => self.layout = value.to_string(),
            "slug" => self.slug = value.to_string(),
            "url" => self.url = value.to_string(),
            "mainnav" => self.mainnav = value == "true",
            "order" => {
                self.order = value
                    .parse::<i64>()
                    .map_err(|_| FrontMatterError::MalformedOrder {
                        document: document.to_string(),
                        value: value.to_string(),
                    })?
            }
            _ => {}
        }
        Ok(())
    }

    /// Non-default fields as `(key, value)` pairs in a fixed key order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        let text = [
            ("title", &self.title),
            ("author", &self.author),
            ("layout", &self.layout),
            ("slug", &self.slug),
            ("url", &self.url),
        ];
        for (key, value) in text {
            if !value.is_empty() {
                fields.push((key, value.clone()));
            }
        }
        if self.mainnav {
            fields.push(("mainnav", "true".to_string()));
        }
        if self.order != 0 {
            fields.push(("order", self.order.to_string()));
        }
        fields
    }

    /// Render the header back to front-matter text, delimiters included.
    ///
    /// String values are always quoted so leading/trailing whitespace and
    /// literal quotes survive a parse.
    pub fn to_front_matter(&self) -> String {
        let mut out = String::from(DELIMITER);
        out.push('\n');
        for (key, value) in self.fields() {
            match key {
                "mainnav" | "order" => out.push_str(&format!("{key}: {value}\n")),
                _ => out.push_str(&format!("{key}: \"{value}\"\n")),
            }
        }
        out.push_str(DELIMITER);
        out.push('\n');
        out
    }
}

/// A parsed source page.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// File name within the pages directory, e.g. `index.md`.
    pub name: String,
    pub modified: SystemTime,
    /// Full text with line endings normalized to `\n`.
    pub raw: String,
    pub metadata: Metadata,
    pub body: String,
}

impl Document {
    /// Parse `raw` into header and body.
    pub fn parse(
        name: impl Into<String>,
        modified: SystemTime,
        raw: &str,
    ) -> Result<Self, FrontMatterError> {
        let name = name.into();
        let raw = normalize_line_endings(raw);
        let (metadata, body) = split_front_matter(&name, &raw)?;
        Ok(Self {
            name,
            modified,
            raw,
            metadata,
            body,
        })
    }

    /// Read the file at `path` and parse it. The document name is the file name.
    ///
    /// A file that is not valid UTF-8 is a [`FrontMatterError::Io`] error.
    pub fn read(path: &Path, modified: SystemTime) -> Result<Self, FrontMatterError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = fs::read_to_string(path).map_err(|source| FrontMatterError::Io {
            document: name.clone(),
            source,
        })?;
        Self::parse(name, modified, &text)
    }

    /// File name without its extension: `about.md` → `about`.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Strip exactly one pair of surrounding double quotes.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn split_front_matter(name: &str, text: &str) -> Result<(Metadata, String), FrontMatterError> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut metadata = Metadata::default();
    let mut delimiters = 0;
    // A bad `order` only counts once the header is known to be closed.
    let mut malformed = None;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed == DELIMITER {
            delimiters += 1;
            if delimiters == 2 {
                return match malformed {
                    Some(err) => Err(err),
                    None => Ok((metadata, lines[i + 1..].join("\n"))),
                };
            }
            continue;
        }
        if delimiters == 1
            && let Some((key, value)) = trimmed.split_once(':')
        {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            if let Err(err) = metadata.apply(key, unquote(value.trim()), name) {
                malformed = malformed.or(Some(err));
            }
        }
    }

    Ok((Metadata::default(), text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(raw: &str) -> Document {
        Document::parse("page.md", SystemTime::UNIX_EPOCH, raw).unwrap()
    }

    // =========================================================================
    // Header parsing
    // =========================================================================

    #[test]
    fn parses_all_known_fields() {
        let doc = parse(
            "---\ntitle: Home\nauthor: Ada\nlayout: page\nslug: home\nurl: about/me\nmainnav: true\norder: 3\n---\n# Hi",
        );
        assert_eq!(
            doc.metadata,
            Metadata {
                title: "Home".into(),
                author: "Ada".into(),
                layout: "page".into(),
                slug: "home".into(),
                url: "about/me".into(),
                mainnav: true,
                order: 3,
            }
        );
        assert_eq!(doc.body, "# Hi");
    }

    #[test]
    fn body_excludes_delimiters_and_keeps_trailing_newline() {
        let doc = parse("---\ntitle: x\n---\nline one\n\nline two\n");
        assert_eq!(doc.body, "line one\n\nline two\n");
    }

    #[test]
    fn splits_on_first_colon_only() {
        let doc = parse("---\ntitle: Re: a story\nurl: https://x.org/a\n---\n");
        assert_eq!(doc.metadata.title, "Re: a story");
        assert_eq!(doc.metadata.url, "https://x.org/a");
    }

    #[test]
    fn strips_one_layer_of_quotes() {
        let doc = parse("---\ntitle: \"Quoted\"\nauthor: \"\"Double\"\"\n---\n");
        assert_eq!(doc.metadata.title, "Quoted");
        assert_eq!(doc.metadata.author, "\"Double\"");
    }

    #[test]
    fn trims_keys_values_and_delimiters() {
        let doc = parse("  ---  \n  title  :   Spaced   \n---\t\nbody");
        assert_eq!(doc.metadata.title, "Spaced");
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn ignores_unknown_keys_and_keyless_lines() {
        let doc = parse("---\ncolor: red\njust text\n: orphan\ntitle: T\n---\n");
        assert_eq!(
            doc.metadata,
            Metadata {
                title: "T".into(),
                ..Metadata::default()
            }
        );
    }

    #[test]
    fn mainnav_requires_exact_true() {
        assert!(parse("---\nmainnav: true\n---\n").metadata.mainnav);
        assert!(!parse("---\nmainnav: True\n---\n").metadata.mainnav);
        assert!(!parse("---\nmainnav: yes\n---\n").metadata.mainnav);
        assert!(parse("---\nmainnav: \"true\"\n---\n").metadata.mainnav);
    }

    #[test]
    fn negative_order_parses() {
        assert_eq!(parse("---\norder: -2\n---\n").metadata.order, -2);
    }

    #[test]
    fn malformed_order_names_document() {
        let err = Document::parse("broken.md", SystemTime::UNIX_EPOCH, "---\norder: abc\n---\n")
            .unwrap_err();
        match err {
            FrontMatterError::MalformedOrder { document, value } => {
                assert_eq!(document, "broken.md");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn third_delimiter_belongs_to_body() {
        let doc = parse("---\ntitle: a\n---\nbefore\n---\nafter");
        assert_eq!(doc.metadata.title, "a");
        assert_eq!(doc.body, "before\n---\nafter");
    }

    #[test]
    fn closing_delimiter_on_last_line_gives_empty_body() {
        let doc = parse("---\ntitle: a\n---");
        assert_eq!(doc.metadata.title, "a");
        assert_eq!(doc.body, "");
    }

    // =========================================================================
    // No-header fallback
    // =========================================================================

    #[test]
    fn no_delimiter_is_all_body() {
        let doc = parse("# Title\n\ntitle: not metadata\n");
        assert_eq!(doc.metadata, Metadata::default());
        assert_eq!(doc.body, "# Title\n\ntitle: not metadata\n");
    }

    #[test]
    fn single_delimiter_is_all_body() {
        let raw = "intro\n---\ntitle: nope\norder: abc\n";
        let doc = parse(raw);
        assert_eq!(doc.metadata, Metadata::default());
        assert_eq!(doc.body, raw);
    }

    #[test]
    fn crlf_is_normalized() {
        let doc = parse("---\r\ntitle: Win\r\n---\r\nline\r\nnext");
        assert_eq!(doc.metadata.title, "Win");
        assert_eq!(doc.body, "line\nnext");
        assert!(!doc.raw.contains('\r'));

        let fallback = parse("a\r\nb");
        assert_eq!(fallback.body, "a\nb");
    }

    // =========================================================================
    // Round trip
    // =========================================================================

    #[test]
    fn front_matter_round_trip() {
        let metadata = Metadata {
            title: "  padded  ".into(),
            author: "\"quoted\"".into(),
            layout: "post".into(),
            slug: "".into(),
            url: "blog/first: post".into(),
            mainnav: true,
            order: -7,
        };
        let text = format!("{}body", metadata.to_front_matter());
        let doc = parse(&text);
        assert_eq!(doc.metadata, metadata);
        assert_eq!(doc.metadata.fields(), metadata.fields());
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn default_metadata_serializes_to_empty_header() {
        assert_eq!(Metadata::default().to_front_matter(), "---\n---\n");
    }

    // =========================================================================
    // Reading from disk
    // =========================================================================

    #[test]
    fn read_uses_file_name_as_identity() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("about.md");
        std::fs::write(&path, "---\ntitle: About\n---\nHello").unwrap();

        let doc = Document::read(&path, SystemTime::UNIX_EPOCH).unwrap();
        assert_eq!(doc.name, "about.md");
        assert_eq!(doc.stem(), "about");
        assert_eq!(doc.metadata.title, "About");
        assert_eq!(doc.body, "Hello");
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = Document::read(&tmp.path().join("gone.md"), SystemTime::UNIX_EPOCH).unwrap_err();
        assert!(matches!(err, FrontMatterError::Io { .. }));
    }

    #[test]
    fn read_non_utf8_is_invalid_data() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin1.md");
        std::fs::write(&path, b"---\ntitle: Caf\xe9\n---\n").unwrap();
        match Document::read(&path, SystemTime::UNIX_EPOCH) {
            Err(FrontMatterError::Io { document, source }) => {
                assert_eq!(document, "latin1.md");
                assert_eq!(source.kind(), io::ErrorKind::InvalidData);
            }
            other => panic!("expected invalid data, got {other:?}"),
        }
    }
}
