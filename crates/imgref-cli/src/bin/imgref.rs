//! imgref binary entry point

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use imgref_cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping after the current document");
            on_interrupt.cancel();
        }
    });

    imgref_cli::run(cli, cancel).await
}
