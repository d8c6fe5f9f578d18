mod config;
mod output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use profilestats_core::estimate_series;
use profilestats_core::github::GitHubClient;
use profilestats_core::ledger::{JsonFileLedger, LedgerStore};
use profilestats_core::npm::NpmClient;
use profilestats_core::period::LastYearPeriods;
use profilestats_core::pipeline::{build_languages, StatsPipeline};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use crate::config::ProfileConfig;

#[derive(Parser)]
#[command(name = "profilestats")]
#[command(author, version, about = "GitHub contribution and npm download charts for a profile README")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable debug logging")]
    debug: bool,

    #[arg(long, global = true, help = "Settings file (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Download ledger file [default: history.json]")]
    ledger: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable spinner")]
    no_spinner: bool,
}

#[derive(Args)]
struct GitHubArgs {
    #[arg(long, env = "GITHUB_LOGIN", help = "GitHub user to chart")]
    github_login: String,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, help = "GitHub token")]
    github_token: String,
}

#[derive(Args)]
struct NpmArgs {
    #[arg(long, env = "NPM_LOGIN", help = "npm maintainer handle")]
    npm_login: String,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch everything and write the chart datasets")]
    Generate {
        #[command(flatten)]
        github: GitHubArgs,
        #[command(flatten)]
        npm: NpmArgs,
        #[arg(long, help = "Output directory [default: assets]")]
        output: Option<PathBuf>,
    },
    #[command(about = "Build the contributions and downloads chart data")]
    Stats {
        #[command(flatten)]
        github: GitHubArgs,
        #[command(flatten)]
        npm: NpmArgs,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    #[command(about = "Build the languages chart data")]
    Languages {
        #[command(flatten)]
        github: GitHubArgs,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    #[command(about = "Show the stored npm download history for the last 12 months")]
    Ledger {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli) {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = ProfileConfig::load(cli.config.as_deref())?;
    let ledger_path = cli
        .ledger
        .clone()
        .unwrap_or_else(|| config.paths.ledger.clone());

    match cli.command {
        Commands::Generate {
            github,
            npm,
            output,
        } => {
            let output = output.unwrap_or_else(|| config.paths.output.clone());
            run_generate(&config, &ledger_path, &output, github, npm, cli.no_spinner)
        }
        Commands::Stats { github, npm, json } => {
            run_stats(&config, &ledger_path, github, npm, json, cli.no_spinner)
        }
        Commands::Languages { github, json } => {
            run_languages(&config, github, json, cli.no_spinner)
        }
        Commands::Ledger { json } => run_ledger(&ledger_path, json),
    }
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn spinner(no_spinner: bool, message: &str) -> Option<ProgressBar> {
    if no_spinner {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn stats_pipeline(
    config: &ProfileConfig,
    ledger_path: &Path,
    github: GitHubClient,
    npm: &NpmArgs,
) -> Result<StatsPipeline<GitHubClient, NpmClient, JsonFileLedger>> {
    Ok(StatsPipeline::new(
        github,
        NpmClient::new(&npm.npm_login)?,
        JsonFileLedger::new(ledger_path),
        config.stats.clone(),
    ))
}

fn run_generate(
    config: &ProfileConfig,
    ledger_path: &Path,
    output: &Path,
    github: GitHubArgs,
    npm: NpmArgs,
    no_spinner: bool,
) -> Result<()> {
    let github = GitHubClient::new(github.github_login, github.github_token)?;
    let pipeline = stats_pipeline(config, ledger_path, github.clone(), &npm)?;

    let pb = spinner(no_spinner, "Fetching GitHub and npm data...");
    let rt = runtime()?;
    let result = rt.block_on(pipeline.build_profile(&github, &config.languages, now()));
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let report = result?;

    let written = output::write_datasets(output, &report, config)?;
    for path in written {
        println!("  {} {}", "wrote".green(), path.display());
    }
    Ok(())
}

fn run_stats(
    config: &ProfileConfig,
    ledger_path: &Path,
    github: GitHubArgs,
    npm: NpmArgs,
    json: bool,
    no_spinner: bool,
) -> Result<()> {
    let github = GitHubClient::new(github.github_login, github.github_token)?;
    let pipeline = stats_pipeline(config, ledger_path, github, &npm)?;

    let pb = spinner(no_spinner, "Fetching contributions and downloads...");
    let rt = runtime()?;
    let result = rt.block_on(pipeline.build_stats(now()));
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.chart)?);
    } else {
        output::print_stats(&report);
    }
    Ok(())
}

fn run_languages(
    config: &ProfileConfig,
    github: GitHubArgs,
    json: bool,
    no_spinner: bool,
) -> Result<()> {
    let github = GitHubClient::new(github.github_login, github.github_token)?;

    let pb = spinner(no_spinner, "Fetching repository languages...");
    let rt = runtime()?;
    let result = rt.block_on(build_languages(&github, &config.languages));
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.chart)?);
    } else {
        output::print_languages(&report);
    }
    Ok(())
}

/// Offline view of the ledger: no network, nothing written.
fn run_ledger(ledger_path: &Path, json: bool) -> Result<()> {
    let store = JsonFileLedger::new(ledger_path);
    let ledger = runtime()?.block_on(store.read())?;

    let now = now();
    let year = LastYearPeriods::new(now);
    let raw = ledger.project(&year.periods);
    let estimated = estimate_series(&raw, now.naive_local());
    let window = output::LedgerWindow::new(&ledger, &year.periods, &raw, &estimated);

    if json {
        println!("{}", serde_json::to_string_pretty(&window)?);
    } else {
        output::print_ledger(&window, store.path());
    }
    Ok(())
}
