//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Resumable streaming downloads over HTTP(S).
///
/// Streamfetch saves each URL to disk with range-request resume, fixed-delay
/// retries, and a write buffer sized from the file length and free memory.
#[derive(Parser, Debug)]
#[command(name = "streamfetch")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download (reads one per line from stdin when omitted)
    pub urls: Vec<String>,

    /// JSON batch file: an array of URL strings and/or download records
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Destination directory (default: config `output_dir`, then current directory)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Save under this file name (single URL only)
    #[arg(long, value_name = "NAME")]
    pub file_name: Option<String>,

    /// Continue partial files with range requests
    #[arg(long)]
    pub resume: bool,

    /// Overwrite existing files
    #[arg(short, long)]
    pub force: bool,

    /// Confirm overwriting existing files without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Show what would be downloaded without transferring anything
    #[arg(long)]
    pub dry_run: bool,

    /// Retries after the first attempt (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub retry_count: Option<u32>,

    /// Seconds to wait between attempts (0-3600)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub retry_delay: Option<u64>,

    /// Connect and read timeout in seconds (1-3600)
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Write buffer multiplier (0 = automatic, max 10)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub buffer_factor: Option<u8>,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Extra request header as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Print outcomes as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Read defaults from this config file instead of the default location
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let Some((name, value)) = raw.split_once(':') else {
        return Err(format!("expected NAME:VALUE, got '{raw}'"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("header name must not be empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}
