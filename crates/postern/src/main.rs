//! Postern - a terminal mail client on top of maildir, notmuch and sendmail.

mod cli;
mod commands;
mod summary;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use postern_core::{Config, validate_config};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("cannot load configuration from {}", path.display()))?,
        None => Config::load_default().context("cannot load configuration")?,
    };

    if let Err(failures) = validate_config(&config) {
        for (account, errors) in failures {
            for error in errors {
                warn!(account, field = error.field(), "{error}");
            }
        }
    }
    debug!(accounts = config.accounts.len(), "configuration loaded");
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postern=info,postern_core=info,postern_mime=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = || load_config(cli.config.as_deref());

    match &cli.command {
        Command::Show { file, json } => commands::show(file, *json),
        Command::Reply { file, all, draft } => {
            commands::reply(&config()?, file, *all, *draft).await
        }
        Command::Compose { attachments, draft } => {
            commands::compose(&config()?, attachments, *draft).await
        }
        Command::Send { file } => commands::send(&config()?, file).await,
        Command::Draft { file } => commands::draft(&config()?, file).await,
        Command::Open { file, number } => commands::open(&config()?, file, *number).await,
    }
}
