//! # Usage
//!
//! - `roq -s <service> -k <key>` - Verify a key against a service
//! - `roq -s aws -k <access key> --secret <secret key>` - Verify a key pair
//! - `roq --list` - List supported services

mod commands;
mod ui;

use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches, Parser};
use console::style;
use roq_core::Catalog;

use crate::ui::colors;

const REPO_URL: &str = "https://github.com/1hehaq/roq";

#[derive(Debug, Parser)]
#[command(
    name = "roq",
    version,
    styles = ui::clap_styles(),
    arg_required_else_help = true,
)]
struct Cli {
    /// Service to verify the key against (see --list).
    #[arg(short, long, value_name = "SERVICE", required_unless_present = "list")]
    service: Option<String>,

    /// API key or token to verify.
    #[arg(short, long, value_name = "KEY", required_unless_present = "list")]
    key: Option<String>,

    /// Secondary secret for services that need one (e.g. aws).
    #[arg(long, value_name = "SECRET")]
    secret: Option<String>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// List all supported services.
    #[arg(short, long)]
    list: bool,

    /// Load services from this TOML catalog instead of the bundled one.
    #[arg(long, value_name = "PATH", env = "ROQ_CATALOG")]
    catalog: Option<PathBuf>,
}

fn main() {
    #[cfg(feature = "tracing")]
    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }

    let cli = parse_cli();

    if let Err(e) = run(cli) {
        ui::print_error(&format!("{e:#}"));
        std::process::exit(ui::exit::ERROR);
    }
}

fn parse_cli() -> Cli {
    let cmd = Cli::command().about(build_about()).after_help(build_after_help());

    let matches = cmd.get_matches();

    #[expect(clippy::expect_used, reason = "clap already validated args; this cannot fail")]
    Cli::from_arg_matches(&matches).expect("failed to parse arguments")
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let catalog = load_catalog(cli.catalog.as_deref())?;

    if cli.list {
        commands::list::run(&catalog);
        return Ok(());
    }

    let (Some(service), Some(key)) = (cli.service, cli.key) else {
        anyhow::bail!("both --service and --key are required");
    };

    commands::verify::run(catalog, &service, &key, cli.secret.as_deref(), cli.json)
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
    let catalog = match path {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::load()?,
    };
    Ok(catalog)
}

fn build_about() -> String {
    format!(
        r"
  {} checks whether an API key is live by making one request
  to the service it belongs to.

  Use responsibly and only on keys you are authorised to test.",
        colors::accent().apply_to("roq").bold()
    )
}

fn build_after_help() -> String {
    format!(
        r"
  {}
    roq -s github -k ghp_xxxxxxxxxxxx          Verify a GitHub token
    roq -s slack -k xoxb-... --json            Print the verdict as JSON
    roq -s aws -k AKIA... --secret SECRET      Verify an AWS key pair
    roq --list                                 List supported services

  Learn more: {}",
        style("Examples:").bold(),
        colors::accent().apply_to(REPO_URL).underlined()
    )
}
