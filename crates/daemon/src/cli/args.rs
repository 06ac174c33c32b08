pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "burrow")]
#[command(about = "Serve a directory to your community, with grants, share links and search")]
#[command(version)]
pub struct Args {
    /// Address of a running daemon (defaults to localhost on the configured port)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the burrow config directory (defaults to ~/.burrow)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
