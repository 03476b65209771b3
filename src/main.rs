use clap::{Parser, Subcommand};
use pagesmith::build::{self, BuildOptions};
use pagesmith::output::Reporter;
use pagesmith::{init, serve};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that build the site.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Site directory (contains config.json)
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Ignore the change-tracking snapshot and rebuild every page
    #[arg(long)]
    all: bool,

    /// Use this theme instead of the one named in config.json
    #[arg(long)]
    theme: Option<String>,
}

impl BuildArgs {
    fn options(&self) -> BuildOptions {
        BuildOptions {
            rebuild_all: self.all,
            theme: self.theme.clone(),
        }
    }
}

#[derive(Parser)]
#[command(name = "pagesmith")]
#[command(about = "Incremental static site generator for front-matter markdown pages")]
#[command(long_about = "\
Incremental static site generator for front-matter markdown pages

Pages in src/pages/*.md are rendered with the layouts in themes/<theme>/ and
written to build/. Only pages modified since the last build are rebuilt.

Site structure:

  my-site/
  ├── config.json          # {\"title\", \"url\", \"author\", \"theme\"}
  ├── src/pages/
  │   └── index.md         # front matter between two --- lines, then markdown
  ├── themes/default/
  │   ├── page.html        # Jinja: {{ page_title }}, {{ content }}, ...
  │   └── static/          # copied to build/static/
  └── build/

Front matter keys: title, author, layout, slug, url, mainnav, order.")]
#[command(version)]
struct Cli {
    /// Print every page as it is built
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new site skeleton
    Init {
        /// Directory to create (must be missing or empty)
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Render stale pages into build/
    Build(BuildArgs),
    /// Build, then serve build/ over HTTP on localhost
    Serve {
        #[command(flatten)]
        build: BuildArgs,

        /// Port to listen on (moves up if taken)
        #[arg(long, default_value_t = serve::DEFAULT_PORT)]
        port: u16,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let reporter = Reporter::new(cli.verbose);

    match cli.command {
        Command::Init { dir } => {
            init::init_site(&dir)?;
            println!("==> Created site at {}", dir.display());
        }
        Command::Build(args) => {
            if !run_build(&args, &reporter)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Serve { build, port } => {
            if !run_build(&build, &reporter)? {
                eprintln!("warning: some pages failed to build");
            }
            serve::serve(&build.dir, port)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Run one build and print its summary. Returns whether every page built.
fn run_build(args: &BuildArgs, reporter: &Reporter) -> Result<bool, build::BuildError> {
    let report = build::build(&args.dir, &args.options(), reporter)?;
    reporter.report(&report);
    Ok(report.is_success())
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the level.
fn init_tracing(verbose: bool) {
    let default = if verbose { "pagesmith=debug" } else { "pagesmith=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
