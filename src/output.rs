//! CLI output formatting.
//!
//! # Architecture
//!
//! Every message has a `format_*` function that returns `Vec<String>` and
//! does no I/O, so the text can be tested directly. [`Reporter`] is the only
//! place that writes to the terminal: progress goes to stdout, per-page
//! failures to stderr.
//!
//! A `Reporter` is created once in `main` from the CLI flags and handed to
//! the build explicitly; there is no global logger state.
//!
//! # Output Format
//!
//! ```text
//! ==> 3 pages, 2 to build
//!     index.md → build/index.html
//!     post.md → build/blog/post/index.html
//! ==> Built 2 pages, 1 up to date
//! ```
//!
//! Per-page lines only appear with `--verbose`. Failures are always shown:
//!
//! ```text
//! error: bad.md: malformed front matter: value of 'order' must be an integer in 'bad.md', got 'abc'
//! ```

use crate::build::{BuildEvent, BuildReport};

/// Terminal output settings for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    /// Show a line for every page as it is built.
    pub verbose: bool,
    /// Suppress all output.
    pub quiet: bool,
}

impl Reporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
        }
    }

    /// A reporter that prints nothing. Callers read the [`BuildReport`]
    /// instead.
    pub fn quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }

    pub fn event(&self, event: &BuildEvent) {
        if self.quiet {
            return;
        }
        let lines = format_build_event(event, self.verbose);
        if matches!(event, BuildEvent::PageFailed { .. }) {
            lines.iter().for_each(|line| eprintln!("{line}"));
        } else {
            lines.iter().for_each(|line| println!("{line}"));
        }
    }

    pub fn report(&self, report: &BuildReport) {
        if self.quiet {
            return;
        }
        for line in format_build_report(report) {
            println!("{line}");
        }
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Format one progress event. Per-page success lines need `verbose`.
pub fn format_build_event(event: &BuildEvent, verbose: bool) -> Vec<String> {
    match event {
        BuildEvent::Started { total, stale } => {
            vec![format!("==> {}, {} to build", plural(*total, "page"), stale)]
        }
        BuildEvent::PageBuilt { name, output } if verbose => {
            vec![format!("    {} \u{2192} {}", name, output.display())]
        }
        BuildEvent::PageBuilt { .. } => Vec::new(),
        BuildEvent::PageFailed {
            name,
            kind,
            message,
        } => vec![format!("error: {name}: {kind}: {message}")],
        BuildEvent::AssetsCopied { files } if verbose => {
            vec![format!("    copied {} from theme", plural(*files, "static file"))]
        }
        BuildEvent::AssetsCopied { .. } => Vec::new(),
    }
}

/// Format the summary printed after a build.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![format!(
        "==> Built {}, {} up to date",
        plural(report.built.len(), "page"),
        report.fresh
    )];
    if !report.failures.is_empty() {
        lines.push(format!(
            "==> {} failed:",
            plural(report.failures.len(), "page")
        ));
        for failure in &report.failures {
            lines.push(format!("    {} ({})", failure.name, failure.error.kind()));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuiltPage, DocumentError, DocumentFailure};
    use std::path::PathBuf;

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "page"), "1 page");
        assert_eq!(plural(0, "page"), "0 pages");
        assert_eq!(plural(3, "page"), "3 pages");
    }

    #[test]
    fn started_event() {
        let lines = format_build_event(&BuildEvent::Started { total: 3, stale: 2 }, false);
        assert_eq!(lines, vec!["==> 3 pages, 2 to build"]);
    }

    #[test]
    fn page_built_only_when_verbose() {
        let event = BuildEvent::PageBuilt {
            name: "index.md".into(),
            output: PathBuf::from("build/index.html"),
        };
        assert!(format_build_event(&event, false).is_empty());
        assert_eq!(
            format_build_event(&event, true),
            vec!["    index.md \u{2192} build/index.html"]
        );
    }

    #[test]
    fn page_failed_always_shown() {
        let event = BuildEvent::PageFailed {
            name: "bad.md".into(),
            kind: "render",
            message: "template not found: x".into(),
        };
        assert_eq!(
            format_build_event(&event, false),
            vec!["error: bad.md: render: template not found: x"]
        );
    }

    #[test]
    fn report_lists_failures() {
        let report = BuildReport {
            total: 3,
            fresh: 1,
            built: vec![BuiltPage {
                name: "a.md".into(),
                output: PathBuf::from("build/a.html"),
            }],
            failures: vec![DocumentFailure {
                name: "b.md".into(),
                error: DocumentError::UnsafeUrl("../x".into()),
            }],
            ..BuildReport::default()
        };
        assert_eq!(
            format_build_report(&report),
            vec![
                "==> Built 1 page, 1 up to date",
                "==> 1 page failed:",
                "    b.md (unsafe url)",
            ]
        );
    }
}
