use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fitbit_client::config::Config;
use fitbit_client::http_client::ReqwestFitbitClient;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use f2g::auth_browser::BrowserFlow;
use f2g::cli::{Cli, Command, ConvertArgs};
use f2g::commands::{self, ConvertOptions, OutputFormat, StdinConfirmer};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("F2G_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn options(args: &ConvertArgs, format: OutputFormat) -> ConvertOptions {
    ConvertOptions {
        cache_directory: args.cache_directory.clone(),
        directory: args.directory.clone(),
        start_date: args.start_date,
        end_date: args.end_date,
        format,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::from_env().context("configuration")?;
    let flow = BrowserFlow::bind(&config.redirect_uri)
        .await
        .context("redirect listener")?;
    let client = Arc::new(ReqwestFitbitClient::new(config));

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing the current request");
            let _ = cancel_tx.send(true);
        }
    });

    let opts = match &cli.command {
        Command::CreateActivityTcx(args) => options(args, OutputFormat::Tcx),
        Command::CreateActivityFit(args) => options(args, OutputFormat::Fit),
    };
    commands::run_convert(client, &flow, &StdinConfirmer, &opts, &mut cancel_rx)
        .await
        .context("conversion")?;
    Ok(())
}
