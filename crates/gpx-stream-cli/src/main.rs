//! gpx-stream CLI - GPX detection and writing tool
//!
//! A command-line interface for sniffing GPX files and writing GPX documents
//! from JSON records.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use gpx_stream::{Detection, Detector, DetectorConfig, GpxRecords, GpxWriter, WriterOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit status when the input is not GPX
const EXIT_NOT_GPX: u8 = 1;

/// Exit status when a command failed
const EXIT_FAILURE: u8 = 2;

/// Configuration file structure
///
/// ```toml
/// [writer]
/// line_ending = "LF"
/// use_extensions = true
/// creator = "My Tracker"
///
/// [writer.metadata]
/// NAME = "Morning ride"
///
/// [detect]
/// chunk_size = 8192
/// ```
///
/// Precedence order (highest to lowest):
/// 1. `-O KEY=VALUE` options
/// 2. Config file given with `--config`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Config {
    /// Writer options for the create command
    writer: WriterOptions,

    /// Read limits for the detect command
    detect: DetectorConfig,
}

impl Config {
    /// Load configuration from file
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "gpx-stream",
    about = "Detect GPX files and write GPX documents",
    version
)]
struct Args {
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log more details (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// TOML configuration file with [writer] and [detect] tables
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a file is GPX and print its metadata
    ///
    /// Exits with status 0 when the file is GPX and 1 when it is not.
    Detect {
        /// Input file path
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Print the detection result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a GPX document from a JSON records file
    Create {
        /// Output file path, or '-' for stdout (no bounds are written to stdout)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// JSON file with "waypoints", "routes" and "tracks" arrays
        #[arg(short, long, value_name = "JSON")]
        records: PathBuf,

        /// Creation option, e.g. -O LINEFORMAT=CRLF or -O METADATA_NAME=Hike
        #[arg(short = 'O', long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        options: Vec<(String, String)>,
    },
}

/// Split a `KEY=VALUE` creation option
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.quiet, args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    match args.command {
        Commands::Detect { input, json } => detect(&input, json, config.detect),
        Commands::Create {
            output,
            records,
            options,
        } => {
            create(&output, &records, config.writer, &options)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn detect(input: &Path, json: bool, config: DetectorConfig) -> Result<ExitCode> {
    let detection = Detector::new(config)
        .detect_path(input)
        .with_context(|| format!("Failed to detect {}", input.display()))?;

    if json {
        let text = serde_json::to_string_pretty(&detection)
            .context("Failed to serialize detection result")?;
        println!("{text}");
    } else {
        print_detection(input, &detection);
    }

    if detection.is_valid() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_NOT_GPX))
    }
}

fn print_detection(input: &Path, detection: &Detection) {
    if !detection.is_valid() {
        println!("{}: not GPX", input.display());
        return;
    }

    let version = detection.version.as_deref().unwrap_or_default();
    if detection.uses_extensions {
        println!("{}: GPX {version} (uses extensions)", input.display());
    } else {
        println!("{}: GPX {version}", input.display());
    }
    for (key, value) in detection.metadata.iter() {
        println!("  {key} = {value}");
    }
}

fn create(
    output: &Path,
    records_path: &Path,
    mut options: WriterOptions,
    pairs: &[(String, String)],
) -> Result<()> {
    let records = GpxRecords::from_path(records_path)
        .with_context(|| format!("Failed to load records from {}", records_path.display()))?;

    options
        .apply(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .context("Invalid creation option")?;

    let mut writer = GpxWriter::create(output, &options)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    for waypoint in &records.waypoints {
        writer.write_waypoint(waypoint)?;
    }
    for route in &records.routes {
        writer.write_route(route)?;
    }
    for track in &records.tracks {
        writer.write_track(track)?;
    }

    let patched = writer.reserved_region().is_some() && !writer.bounds().is_empty();
    writer
        .finish()
        .with_context(|| format!("Failed to finish {}", output.display()))?;

    log::info!(
        "Wrote {} waypoints, {} routes and {} tracks to {}{}",
        records.waypoints.len(),
        records.routes.len(),
        records.tracks.len(),
        output.display(),
        if patched { " with bounds" } else { "" }
    );
    Ok(())
}
