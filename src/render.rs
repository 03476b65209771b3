//! Markdown and template rendering.
//!
//! Two small collaborators sit between a parsed [`Document`](crate::document::Document)
//! and the bytes written to `build/`:
//!
//! - [`markdown_to_html`] turns the page body into an HTML fragment using
//!   [pulldown-cmark](https://docs.rs/pulldown-cmark). It never fails.
//! - A [`TemplateEngine`] wraps that fragment in a theme layout. The shipped
//!   engine, [`ThemeTemplates`], loads `themes/<theme>/<layout>.html` into a
//!   [minijinja](https://docs.rs/minijinja) environment.
//!
//! ## Template syntax
//!
//! Layouts are Jinja templates with HTML auto-escaping always on:
//!
//! ```text
//! {{ page_title }}     value from the context, HTML-escaped
//! {{ content }}        the rendered page body, inserted as-is
//! ```
//!
//! `content` is passed in as a safe string, so layouts do not need `|safe`.
//! Unknown keys render as an empty string so a layout written for a richer
//! config still works on a sparse one.

use minijinja::{AutoEscape, Environment, ErrorKind, Value, path_loader};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Layout used when a page's front matter does not name one.
pub const DEFAULT_LAYOUT: &str = "page";

/// Extension of layout files inside a theme directory.
pub const TEMPLATE_EXTENSION: &str = "html";

/// Directory holding all themes, relative to the site root.
pub const THEMES_DIR: &str = "themes";

/// Context key holding the page body. Rendered without escaping.
pub const CONTENT_KEY: &str = "content";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("template not found: {0}")]
    MissingTemplate(PathBuf),
    #[error("invalid layout name '{0}'")]
    InvalidLayout(String),
    #[error("invalid theme name '{0}'")]
    InvalidTheme(String),
    #[error("template {template}: {source}")]
    Template {
        template: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Values available to a layout, keyed by variable name.
pub type Context = BTreeMap<String, String>;

/// Renders a named layout with a context.
pub trait TemplateEngine {
    fn render(&self, layout: &str, context: &Context) -> Result<String, RenderError>;
}

/// Convert a markdown body to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    md_html::push_html(&mut out, parser);
    out
}

/// Layouts read from `themes/<theme>/` on disk.
///
/// Templates are loaded lazily and cached by the environment, so each layout
/// is parsed once per build.
#[derive(Debug)]
pub struct ThemeTemplates {
    dir: PathBuf,
    env: Environment<'static>,
}

impl ThemeTemplates {
    pub fn new(site_root: &Path, theme: &str) -> Result<Self, RenderError> {
        let dir = theme_dir(site_root, theme)?;
        let mut env = Environment::new();
        env.set_loader(path_loader(dir.clone()));
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        Ok(Self { dir, env })
    }

    /// File backing `layout`. An empty layout means [`DEFAULT_LAYOUT`].
    ///
    /// Layout names are bare file stems: anything that could step outside
    /// the theme directory is rejected.
    pub fn template_path(&self, layout: &str) -> Result<PathBuf, RenderError> {
        Ok(self.dir.join(template_name(layout)?))
    }
}

fn template_name(layout: &str) -> Result<String, RenderError> {
    let layout = if layout.is_empty() {
        DEFAULT_LAYOUT
    } else {
        layout
    };
    if !is_plain_name(layout) {
        return Err(RenderError::InvalidLayout(layout.to_string()));
    }
    Ok(format!("{layout}.{TEMPLATE_EXTENSION}"))
}

impl TemplateEngine for ThemeTemplates {
    fn render(&self, layout: &str, context: &Context) -> Result<String, RenderError> {
        let name = template_name(layout)?;
        let template = self.env.get_template(&name).map_err(|source| {
            if source.kind() == ErrorKind::TemplateNotFound {
                RenderError::MissingTemplate(self.dir.join(&name))
            } else {
                RenderError::Template {
                    template: name.clone(),
                    source,
                }
            }
        })?;

        let values: BTreeMap<&str, Value> = context
            .iter()
            .map(|(key, value)| {
                let value = if key == CONTENT_KEY {
                    Value::from_safe_string(value.clone())
                } else {
                    Value::from(value.as_str())
                };
                (key.as_str(), value)
            })
            .collect();

        template
            .render(&values)
            .map_err(|source| RenderError::Template {
                template: name,
                source,
            })
    }
}

/// Directory holding a theme's layouts. The theme must be a bare directory
/// name.
pub fn theme_dir(site_root: &Path, theme: &str) -> Result<PathBuf, RenderError> {
    if !is_plain_name(theme) {
        return Err(RenderError::InvalidTheme(theme.to_string()));
    }
    Ok(site_root.join(THEMES_DIR).join(theme))
}

/// A single path segment that cannot climb out of its parent.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context(pairs: &[(&str, &str)]) -> Context {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // =========================================================================
    // Markdown
    // =========================================================================

    #[test]
    fn markdown_heading() {
        assert_eq!(markdown_to_html("# Hi"), "<h1>Hi</h1>\n");
    }

    #[test]
    fn markdown_tables_enabled() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn markdown_empty_body() {
        assert_eq!(markdown_to_html(""), "");
    }

    // =========================================================================
    // ThemeTemplates
    // =========================================================================

    fn theme(layouts: &[(&str, &str)]) -> (TempDir, ThemeTemplates) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("themes/plain");
        fs::create_dir_all(&dir).unwrap();
        for (name, text) in layouts {
            fs::write(dir.join(format!("{name}.html")), text).unwrap();
        }
        let templates = ThemeTemplates::new(tmp.path(), "plain").unwrap();
        (tmp, templates)
    }

    #[test]
    fn empty_layout_uses_default() {
        let (tmp, templates) = theme(&[]);
        assert_eq!(
            templates.template_path("").unwrap(),
            tmp.path().join("themes/plain/page.html")
        );
    }

    #[test]
    fn layout_outside_theme_is_rejected() {
        let (_tmp, templates) = theme(&[]);
        for bad in ["../secret", "a/b", "..", ".hidden"] {
            assert!(matches!(
                templates.render(bad, &Context::new()),
                Err(RenderError::InvalidLayout(_))
            ));
        }
    }

    #[test]
    fn theme_outside_themes_dir_is_rejected() {
        let tmp = TempDir::new().unwrap();
        for bad in ["../x", "a/b", "..", ""] {
            assert!(matches!(
                ThemeTemplates::new(tmp.path(), bad),
                Err(RenderError::InvalidTheme(_))
            ));
            assert!(theme_dir(tmp.path(), bad).is_err());
        }
        assert_eq!(
            theme_dir(tmp.path(), "dark").unwrap(),
            tmp.path().join("themes/dark")
        );
    }

    #[test]
    fn render_reads_theme_layout() {
        let (_tmp, templates) = theme(&[("post", "<title>{{ page_title }}</title>{{ content }}")]);
        let ctx = context(&[("page_title", "Post"), ("content", "<h1>Hi</h1>")]);
        assert_eq!(
            templates.render("post", &ctx).unwrap(),
            "<title>Post</title><h1>Hi</h1>"
        );
    }

    #[test]
    fn values_are_escaped_but_content_is_not() {
        let (_tmp, templates) = theme(&[("page", "<h1>{{ page_title }}</h1>{{ content }}")]);
        let ctx = context(&[("page_title", "Fish & <Chips>"), ("content", "<p>x</p>")]);
        assert_eq!(
            templates.render("", &ctx).unwrap(),
            "<h1>Fish &amp; &lt;Chips&gt;</h1><p>x</p>"
        );
    }

    #[test]
    fn unknown_variable_renders_empty() {
        let (_tmp, templates) = theme(&[("page", "[{{ nope }}]")]);
        assert_eq!(templates.render("page", &Context::new()).unwrap(), "[]");
    }

    #[test]
    fn jinja_control_flow_is_available() {
        let (_tmp, templates) = theme(&[(
            "page",
            "{% if page_author %}by {{ page_author }}{% else %}anonymous{% endif %}",
        )]);
        let ctx = context(&[("page_author", "Ada")]);
        assert_eq!(templates.render("page", &ctx).unwrap(), "by Ada");
        assert_eq!(templates.render("page", &Context::new()).unwrap(), "anonymous");
    }

    #[test]
    fn syntax_error_names_the_template() {
        let (_tmp, templates) = theme(&[("page", "{{ page_title ")]);
        let err = templates.render("page", &Context::new()).unwrap_err();
        assert!(matches!(&err, RenderError::Template { template, .. } if template == "page.html"));
    }

    #[test]
    fn render_missing_layout_is_missing_template() {
        let (tmp, templates) = theme(&[]);
        match templates.render("page", &Context::new()) {
            Err(RenderError::MissingTemplate(path)) => {
                assert_eq!(path, tmp.path().join("themes/plain/page.html"));
            }
            other => panic!("expected missing template, got {other:?}"),
        }
    }
}
