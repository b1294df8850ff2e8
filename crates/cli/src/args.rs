//! Command-line arguments. Flags override the env file and environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Genomics sample tracking: warehouse export and dashboard.
#[derive(Parser, Debug)]
#[command(name = "gst")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the warehouse query and write every sample to a TSV file
    Export(ExportArgs),

    /// Serve the dashboard
    Server(ServerArgs),
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Path of the TSV file to write
    #[arg(short, long, default_value = "samples.tsv")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Address to listen on (overrides GST_BIND_ADDR)
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Port to listen on; replaces the port of the bind address
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve samples from this TSV file instead of the warehouse (overrides
    /// GST_MOCK_DATA_PATH)
    #[arg(long)]
    pub mock: Option<PathBuf>,

    /// Seconds to keep fetched samples before refreshing; 0 refreshes on
    /// every request
    #[arg(long)]
    pub cache_ttl_secs: Option<u64>,
}
