//! IPLINFO CLI: report how a system was IPLed from a storage dump.
//!
//! Loads a flat storage dump, walks the control-block chain from the PSA and
//! prints the LOADxx suffix, parmlib dataset, parmlib device and IODF id.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use serde::Serialize;

use open_mainframe_iplinfo::output::{render, OutputFormat};
use open_mainframe_iplinfo::{IplInfoConfig, SnapshotAssembler, SnapshotError, StorageImage};

/// IPLINFO CLI.
#[derive(Parser)]
#[command(name = "iplinfo", about = "Report IPL configuration from a z/OS storage dump")]
struct Cli {
    /// Flat storage dump file.
    dump: PathBuf,

    /// Address of the first byte of the dump (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_address, default_value = "0")]
    base: u64,

    /// Address of the PSA; overrides the configuration file.
    #[arg(long, value_parser = parse_address)]
    root: Option<u64>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable debug logging on stderr.
    #[arg(short, long)]
    verbose: bool,
}

/// JSON body emitted on failure with `--format json`.
#[derive(Serialize)]
struct ErrorOutput {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(rendered) => {
            print!("{rendered}");
            if cli.format.is_json() {
                println!();
            }
            ExitCode::SUCCESS
        }
        Err(report) => {
            if cli.format.is_json() {
                let body = ErrorOutput {
                    error: report.to_string(),
                    field: report
                        .downcast_ref::<SnapshotError>()
                        .map(|e| e.field().to_string()),
                };
                if let Ok(json) = serde_json::to_string(&body) {
                    println!("{json}");
                }
            }
            eprintln!("Error: {report}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> miette::Result<String> {
    let config = match &cli.config {
        Some(path) => IplInfoConfig::from_file(path)?,
        None => IplInfoConfig::default(),
    };
    let catalog = config.catalog()?;
    let assembler = SnapshotAssembler::new(&catalog)?;

    let root = cli.root.unwrap_or(config.storage.root_address);
    let image = StorageImage::from_dump(&cli.dump, cli.base, config.storage.addressing_mode)?
        .with_root(root);
    tracing::debug!(
        root = %format_args!("{root:#x}"),
        amode = image.mode().bits(),
        regions = image.region_count(),
        "Walking control blocks"
    );

    let snapshot = assembler.snapshot_from(&image)?;
    render(&snapshot, cli.format).into_diagnostic()
}

fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}
