use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use pulse_social::BatchRequest;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pulse", version, about = "Fetch normalized social-media metadata")]
pub struct Cli {
    /// YAML configuration file. Missing files fall back to defaults.
    #[arg(long, global = true, env = "PULSE_CONFIG", default_value = "pulse.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one entity type for a list of identifiers.
    Fetch(FetchArgs),
    /// List the supported entity types.
    Types,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Entity type tag, e.g. `instagram_profile`.
    #[arg(long = "type", short = 't', required_unless_present = "input")]
    pub kind: Option<String>,

    /// Links, handles or ids to fetch.
    pub identifiers: Vec<String>,

    /// JSON request file: `{"type": ..., "identifiers": [...]}`.
    #[arg(long, conflicts_with_all = ["kind", "identifiers"])]
    pub input: Option<PathBuf>,

    /// Print the response on one line.
    #[arg(long)]
    pub compact: bool,
}

impl FetchArgs {
    pub fn to_request(&self) -> Result<BatchRequest> {
        if let Some(path) = &self.input {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read request file {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("invalid request file {}", path.display()));
        }
        let Some(kind) = &self.kind else {
            bail!("either --type or --input is required");
        };
        Ok(BatchRequest {
            kind: kind.clone(),
            identifiers: self.identifiers.clone(),
        })
    }
}
