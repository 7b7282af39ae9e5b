use anyhow::{Context, Result};
use clap::Parser;
use pulse_common::observability::{LogConfig, init_logging};
use pulse_config::{PulseConfig, PulseConfigLoader};
use pulse_social::{BatchStatus, EntityType, KeyRotator, SocialFetcher};
use std::path::PathBuf;
use std::process::ExitCode;

use cli::{Cli, Command, FetchArgs};
mod cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // .env is optional; real environment variables win over it
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let cfg: PulseConfig = PulseConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .context("failed to load configuration")?;

    let log_path = init_logging(LogConfig {
        app_name: "pulse",
        log_dir: cfg.logging.dir.as_ref().map(PathBuf::from),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;
    tracing::debug!(log = %log_path.display(), config = %cli.config.display(), "pulse.start");

    match cli.command {
        Command::Types => {
            for entity in EntityType::ALL {
                println!("{entity}\t{}", entity.platform());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Fetch(args) => fetch(&cfg, &args).await,
    }
}

async fn fetch(cfg: &PulseConfig, args: &FetchArgs) -> Result<ExitCode> {
    let request = args.to_request()?;
    let keys = cfg.credential_set()?;
    tracing::info!(credentials = keys.len(), "pulse.credentials_loaded");
    let mut rotator = KeyRotator::new(keys)?;
    let fetcher = SocialFetcher::new(cfg.http.timeout(), cfg.http.connect_timeout())?;

    let response = pulse_social::collect(&fetcher, &mut rotator, &request).await?;
    let rendered = if args.compact {
        serde_json::to_string(&response)?
    } else {
        serde_json::to_string_pretty(&response)?
    };
    println!("{rendered}");

    Ok(if response.status == BatchStatus::Failure {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
