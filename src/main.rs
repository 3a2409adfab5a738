use crate::{
    addon::metadata::MetadataClient,
    lockfile::Ledger,
    types::manifest::{Manifest, lockfile_path_for},
    utils::{
        logger::{LogLevel, Logger},
        signature::get_signature,
    },
};
use anyhow::Context;
use clap::{CommandFactory, FromArgMatches, Parser};
use std::path::{Path, PathBuf};

mod addon;
mod error;
mod lockfile;
mod sync;
mod types;
mod utils;

#[derive(Parser)]
#[command(name = "wowsync")]
#[command(about = "Installs and updates World of Warcraft addons listed in a manifest")]
struct Cli {
    /// Addon manifest to read; the lockfile is kept next to it
    #[arg(default_value = "addons.json")]
    manifest: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let signature = get_signature(version);

    let raw_args: Vec<String> = std::env::args().collect();
    if raw_args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", signature);
        return Ok(());
    }

    let matches = Cli::command()
        .version(version)
        .before_help(signature)
        .get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    // reqwest::blocking must stay off the async workers.
    tokio::task::spawn_blocking(move || run_sync(&cli.manifest))
        .await
        .context("Sync task failed")?
}

fn run_sync(manifest_path: &Path) -> anyhow::Result<()> {
    let logger = Logger::new();

    let manifest = Manifest::load(manifest_path)?;
    let lock_path = lockfile_path_for(manifest_path);

    let (ledger, load_err) = Ledger::load_or_default(&lock_path);
    if let Some(e) = load_err {
        let level = if lock_path.exists() {
            LogLevel::Warning
        } else {
            LogLevel::Info
        };
        logger.log_message_with_trace(level, "Starting with an empty lockfile", vec![&e.to_string()]);
    }

    let client = MetadataClient::from_env().context("Failed to build HTTP client")?;
    let (ledger, summary) = sync::run(&manifest, ledger, &client);

    if let Err(e) = ledger.save(&lock_path) {
        logger.log_message(LogLevel::Error, &e.to_string());
    }

    let failed: Vec<String> = summary
        .reports
        .iter()
        .filter(|r| r.result.is_err())
        .map(|r| sync::addon_label(&r.scope, &r.name))
        .collect();
    let done = format!(
        "Done: {} installed, {} up to date, {} failed ({} addons in lockfile)",
        summary.installed(),
        summary.up_to_date(),
        summary.failed(),
        ledger.len()
    );
    if failed.is_empty() {
        logger.log_message(LogLevel::Info, &done);
    } else {
        let refs: Vec<&str> = failed.iter().map(|s| s.as_str()).collect();
        logger.log_message_with_trace(LogLevel::Warning, &done, refs);
    }

    Ok(())
}
