use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the archive ingest service.
    Serve(ServeArgs),
    /// Capture one page and ship it to the ingest service.
    Capture(CaptureArgs),
    /// Move an already-staged capture into the vault by hand.
    Organize(OrganizeArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Configuration file (TOML).
    #[arg(long, default_value = "pagevault.toml")]
    pub config: PathBuf,

    /// Listen address override (defaults to the configured value).
    #[arg(long)]
    pub addr: Option<String>,
}

#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// Page URL to capture (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Configuration file (TOML).
    #[arg(long, default_value = "pagevault.toml")]
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct OrganizeArgs {
    /// Staged capture directory name to place into the vault.
    #[arg(long)]
    pub directory_name: String,

    /// Source URL recorded in the index entry.
    #[arg(long)]
    pub url: String,

    /// Configuration file (TOML).
    #[arg(long, default_value = "pagevault.toml")]
    pub config: PathBuf,
}
