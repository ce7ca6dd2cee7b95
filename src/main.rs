use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use store_locale_sync::cli::{self, Cli};
use store_locale_sync::error::SyncError;

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();
    setup_logging(args.verbose);

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, finishing current locale");
        flag.store(true, Ordering::SeqCst);
    })
    .context("installing interrupt handler")?;

    let config = cli::env::load(args.env.as_deref(), args.root.clone());

    match cli::run(&args, &config, &cancel) {
        Ok(false) => Ok(ExitCode::SUCCESS),
        Ok(true) => Ok(ExitCode::FAILURE),
        Err(SyncError::Cancelled) => {
            eprintln!("interrupted");
            Ok(ExitCode::from(130))
        }
        Err(e) => Err(e).context("run aborted"),
    }
}
