use clap::Parser;
use postsmith::config::{self, CONFIG_FILENAME};
use postsmith::fetch::HttpFetcher;
use postsmith::output;
use postsmith::pipeline::{self, BuildError, BuildReport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "postsmith")]
#[command(about = "Static site generator for markdown blogs")]
#[command(long_about = "\
Static site generator for markdown blogs

Every article under the posts directory becomes an HTML page with the same
relative path. Remote images referenced as ![alt](https://...) are
downloaded into posts/images/, named after a hash of their content, and the
article source is rewritten to point at the local copy.

Posts structure:

  posts/
  ├── hello.md                 # → dist/hello.html
  ├── images/                  # Localized images (managed by postsmith)
  └── rust/
      └── pinning.md           # → dist/rust/pinning.html

Articles may start with TOML front matter between +++ lines (title, date,
author, tags, slug). Only dated articles are listed on the index page.

Run 'postsmith --print-config' to print a documented postsmith.toml.

Exit status: 0 on success, 1 when some articles failed, 2 when the build
could not run.")]
#[command(version)]
struct Cli {
    /// Config file; stock defaults are used when it doesn't exist
    #[arg(long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Print a stock postsmith.toml with all options documented and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if cli.print_config {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(report) => {
            output::print_build_output(&report);
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            tracing::error!(stage = %e.stage(), "build failed");
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<BuildReport, BuildError> {
    let config = config::load_config(&cli.config)?;
    let fetcher = HttpFetcher::new(config.download.timeout())?;
    pipeline::build(&config, &fetcher)
}
