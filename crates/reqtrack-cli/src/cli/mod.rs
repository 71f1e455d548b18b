//! Command-line surface.

pub mod run;

use clap::{Args, ValueEnum};
use reqtrack::config::DEFAULT_HEADER;
use std::path::PathBuf;

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// HAR 1.2 archive
    #[default]
    Har,
    /// JSON array of request records
    Records,
}

/// Flags for a tracking run.
#[derive(Debug, Clone, Args)]
pub struct TrackArgs {
    /// Target URL to load
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Extra headers sent with every request, as "Name: value; Name2: value2"
    #[arg(short = 'H', long = "headers", default_value = DEFAULT_HEADER)]
    pub headers: String,

    /// Proxy for the browser and fallback fetches (e.g. http://127.0.0.1:8080)
    #[arg(short = 'p', long = "proxy")]
    pub proxy: Option<String>,

    /// Navigation timeout in seconds
    #[arg(long = "tnav", default_value = "7")]
    pub nav_timeout: u64,

    /// Settle timeout in seconds
    #[arg(long = "tscr", default_value = "10")]
    pub settle_timeout: u64,

    /// Write output here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Merge into the archive already at --output instead of overwriting it
    #[arg(long, requires = "output")]
    pub merge: bool,

    /// Skip static analysis of the page's scripts
    #[arg(long, conflicts_with = "no_dynamic")]
    pub no_static: bool,

    /// Skip dynamic capture; the page is still loaded for its scripts
    #[arg(long)]
    pub no_dynamic: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Har)]
    pub format: OutputFormat,
}
