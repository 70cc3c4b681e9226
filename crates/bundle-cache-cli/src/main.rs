//! Bundle cache CLI entrypoint.

use bundle_cache_core::config::process_env;
use bundle_cache_core::{CacheKey, FileConfig, Result, Settings, exit_code};
use bundle_cache_store::{
    Archiver, FilesystemStore, ObjectStore, S3Store, SystemTarArchiver, TarGzArchiver,
};
use clap::Parser;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod handlers;


use commands::{Action, Cli};
use handlers::Outcome;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(exit_code::WRONG_USAGE as u8)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(outcome) => {
            if outcome.is_skip() {
                eprintln!("{}", outcome.message());
            } else {
                println!("{} {}", console::style("✓").green(), outcome.message());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    let file_config = FileConfig::load_or_default(process_env);
    let settings = Settings::resolve(cli.options(), &file_config, process_env)?;
    debug!(?settings, "Resolved settings");

    let key = CacheKey::derive(&settings)?;

    let archiver: Box<dyn Archiver> = if cli.system_tar {
        Box::new(SystemTarArchiver::default())
    } else {
        Box::new(TarGzArchiver::default())
    };

    let store: Box<dyn ObjectStore> = match (&cli.store_dir, &cli.endpoint_url) {
        (Some(dir), _) => Box::new(FilesystemStore::new(dir.clone())),
        (None, Some(url)) => Box::new(S3Store::with_endpoint(&settings, url)),
        (None, None) => Box::new(S3Store::new(&settings)),
    };

    match cli.action {
        Action::Upload => handlers::upload(&settings, &key, archiver.as_ref(), store.as_ref()).await,
        Action::Download => {
            handlers::download(&settings, &key, archiver.as_ref(), store.as_ref()).await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
