use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "depot", about = "Depot: blob storage with verified checksums", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Estimate the bytes stored under a content directory
    Estimate(EstimateArgs),
    /// Print the SHA-256 checksum Depot would record for a file
    Checksum(ChecksumArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Base URL used in redirect and static links
    #[arg(long)]
    pub base_url: Option<String>,
    /// Content directory
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// JSON metadata file
    #[arg(long)]
    pub metadata: Option<PathBuf>,
    /// Maximum bytes under management
    #[arg(long)]
    pub quota: Option<u64>,
    /// Cache maximum in bytes; the other bound comes from the file or defaults.
    #[arg(long)]
    pub cache_max: Option<u64>,
    #[arg(long)]
    pub cache_stretch: Option<u64>,
}

#[derive(Args)]
pub struct EstimateArgs {
    #[arg(long, default_value = "data")]
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct ChecksumArgs {
    pub file: PathBuf,
}
