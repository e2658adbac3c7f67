//! CLI entry point for streamfetch.

use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use streamfetch_core::download::{
    BatchOptions, DownloadDefaults, DownloadInput, DownloadOutcome, DownloadSpec, DownloadStatus,
    format_bytes, process_batch,
};
use tracing::{debug, info};

mod cli;
mod config;
mod console;

use cli::Args;
use config::{FileConfig, load_config};
use console::ConsoleSink;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_config(args.config.as_deref())?;
    let file_config = loaded.config.unwrap_or_default();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => file_config
                .verbosity
                .map_or("info", config::VerbositySetting::filter_level),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(
        ?args,
        config_path = ?loaded.path,
        config_verbosity = ?file_config.verbosity.map(config::VerbositySetting::as_str),
        "CLI arguments parsed"
    );

    let inputs = gather_inputs(&args)?;
    if inputs.is_empty() {
        info!("No input provided. Pass URLs as arguments, pipe them via stdin, or use --input.");
        info!("Example: echo 'https://example.com/file.iso' | streamfetch");
        return Ok(ExitCode::SUCCESS);
    }
    info!(items = inputs.len(), "Starting downloads");

    let options = batch_options(&args, &file_config);
    let sink = ConsoleSink::new(!args.quiet && !args.json && io::stderr().is_terminal());
    let outcomes = process_batch(inputs, &options, &sink).await;
    drop(sink);

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&outcomes).context("Failed to serialize outcomes")?;
        println!("{rendered}");
    } else if !args.quiet {
        for outcome in &outcomes {
            println!("{}", summary_line(outcome));
        }
    }

    let failed = outcomes
        .iter()
        .filter(|outcome| outcome.status == DownloadStatus::Failed)
        .count();
    info!(total = outcomes.len(), failed, "Done");
    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Collects inputs from `--input`, positional URLs, or stdin, in that order.
fn gather_inputs(args: &Args) -> Result<Vec<DownloadInput>> {
    let mut inputs = match &args.input {
        Some(path) => read_batch_file(path)?,
        None => Vec::new(),
    };

    let urls = if !args.urls.is_empty() {
        args.urls.clone()
    } else if args.input.is_none() && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read URLs from stdin")?;
        parse_url_lines(&buffer)
    } else {
        Vec::new()
    };

    if let Some(file_name) = &args.file_name {
        let [url] = urls.as_slice() else {
            bail!("--file-name requires exactly one URL, got {}", urls.len());
        };
        inputs.push(DownloadInput::from(DownloadSpec {
            file_name: Some(file_name.clone()),
            ..DownloadSpec::new(url.clone())
        }));
    } else {
        inputs.extend(urls.into_iter().map(DownloadInput::from));
    }
    Ok(inputs)
}

fn read_batch_file(path: &Path) -> Result<Vec<DownloadInput>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file '{}'", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse input file '{}'", path.display()))
}

/// One URL per line; blank lines and `#` comments are ignored.
fn parse_url_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn batch_options(args: &Args, file_config: &FileConfig) -> BatchOptions {
    let builtin = DownloadDefaults::default();
    let headers: BTreeMap<String, String> = args.headers.iter().cloned().collect();

    let defaults = DownloadDefaults {
        output_dir: args
            .output_dir
            .clone()
            .or_else(|| file_config.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(".")),
        headers: (!headers.is_empty()).then_some(headers),
        buffer_factor: args
            .buffer_factor
            .or(file_config.buffer_factor)
            .unwrap_or(builtin.buffer_factor),
        timeout: args
            .timeout
            .or(file_config.timeout_secs)
            .map_or(builtin.timeout, Duration::from_secs),
        resume: args.resume,
        retry_count: args
            .retry_count
            .or(file_config.retry_count)
            .unwrap_or(builtin.retry_count),
        retry_delay: args
            .retry_delay
            .or(file_config.retry_delay_secs)
            .map_or(builtin.retry_delay, Duration::from_secs),
        ignore_ssl_errors: args.insecure,
        force: args.force,
    };

    BatchOptions {
        defaults,
        dry_run: args.dry_run,
        confirm_overwrite: args.yes,
    }
}

fn summary_line(outcome: &DownloadOutcome) -> String {
    let target = outcome
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .or_else(|| outcome.final_url.clone())
        .unwrap_or_else(|| "-".to_string());
    let size = outcome
        .total_bytes
        .map_or_else(|| "-".to_string(), format_bytes);
    let mut line = format!("{:<9} {target} ({size})", outcome.status.to_string());
    if let Some(error) = &outcome.error {
        line.push_str(": ");
        line.push_str(error);
    }
    line
}
