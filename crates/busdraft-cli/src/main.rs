//! Command-line companion for Modbus bridge configuration documents.
//!
//! Pulls and pushes documents over the device HTTP API, and validates,
//! normalizes, and inspects local copies without a device at hand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use busdraft_core::{
    format_address, validate_document, AddressFormat, ConfigService, DraftSession, FunctionCode,
    HttpConfigStore, ValidationProfile,
};

/// Draft, validate, and push Modbus bridge configurations.
#[derive(Parser, Debug)]
#[command(name = "busdraft")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the persisted configuration from a device
    Pull {
        /// Device base URL, e.g. http://192.168.4.1
        #[arg(long)]
        url: String,
        /// Output file (defaults to a timestamped backup name)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Validate a document and push it to a device
    Push {
        /// Device base URL
        #[arg(long)]
        url: String,
        /// Document to push
        file: PathBuf,
        /// Enforce the first-generation rule set
        #[arg(long)]
        legacy: bool,
    },
    /// Validate a configuration document
    Validate {
        file: PathBuf,
        /// Enforce the first-generation rule set
        #[arg(long)]
        legacy: bool,
    },
    /// Rewrite a document in canonical minimal form
    Normalize {
        file: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the bus / device / datapoint tree of a document
    Show {
        file: PathBuf,
        /// Only show nodes matching this query
        #[arg(short, long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Pull { url, out } => pull(&url, out).await,
        Command::Push { url, file, legacy } => push(&url, &file, legacy).await,
        Command::Validate { file, legacy } => validate(&file, legacy),
        Command::Normalize { file, out } => normalize(&file, out),
        Command::Show { file, query } => show(&file, query.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var("BUSDRAFT_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);
    let default_directive = if verbose {
        "busdraft_core=debug,busdraft_cli=debug"
    } else {
        "busdraft_core=info,busdraft_cli=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

fn read_document(file: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", file.display()))
}

fn profile_for(legacy: bool) -> ValidationProfile {
    if legacy {
        ValidationProfile::Legacy
    } else {
        ValidationProfile::Extended
    }
}

async fn pull(url: &str, out: Option<PathBuf>) -> Result<()> {
    let store = Arc::new(HttpConfigStore::new(url));
    let service = ConfigService::new(store);
    let document = service.backup().await?;

    let path = out.unwrap_or_else(|| {
        PathBuf::from(format!(
            "config-backup-{}.json",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        ))
    });
    std::fs::write(&path, serde_json::to_string_pretty(&document)?)
        .with_context(|| format!("cannot write {}", path.display()))?;
    println!("Saved {}", path.display());
    Ok(())
}

async fn push(url: &str, file: &Path, legacy: bool) -> Result<()> {
    let document = read_document(file)?;
    let store = Arc::new(HttpConfigStore::new(url));
    let mut service = ConfigService::new(store).with_profile(profile_for(legacy));
    service.import(&document);

    match service.commit().await {
        Ok(committed) => {
            println!("Pushed {} device(s) to {}", committed.devices.len(), url);
            Ok(())
        }
        Err(busdraft_core::CommitError::Validation(report)) => {
            eprintln!("Refusing to push, {} problem(s):", report.errors.len());
            for error in &report.errors {
                eprintln!("  - {error}");
            }
            std::process::exit(1);
        }
        Err(busdraft_core::CommitError::Store(err)) => Err(err.into()),
    }
}

fn validate(file: &Path, legacy: bool) -> Result<()> {
    let document = read_document(file)?;
    let report = validate_document(&document, profile_for(legacy));
    if report.ok {
        println!("OK: {}", file.display());
        return Ok(());
    }
    eprintln!("{} problem(s) in {}:", report.errors.len(), file.display());
    for error in &report.errors {
        eprintln!("  - {error}");
    }
    std::process::exit(1);
}

fn normalize(file: &Path, out: Option<PathBuf>) -> Result<()> {
    let document = read_document(file)?;
    let session = DraftSession::from_document(&document);
    let normalized = serde_json::to_string_pretty(&session.to_document())?;
    debug!(bytes = normalized.len(), "normalized document");
    match out {
        Some(path) => {
            std::fs::write(&path, normalized)
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{normalized}"),
    }
    Ok(())
}

fn show(file: &Path, query: Option<&str>) -> Result<()> {
    let document = read_document(file)?;
    let session = DraftSession::from_document(&document);
    let bus = session.bus();
    let matches = session.search(query.unwrap_or_default());

    println!(
        "{} @ {} baud {}{}",
        bus.name,
        bus.baud,
        bus.serial_format,
        if bus.enabled { "" } else { " (disabled)" }
    );
    for device in &bus.devices {
        let points: Vec<&String> = matches
            .datapoint_ids
            .iter()
            .filter(|(d, _)| d == &device.id)
            .map(|(_, p)| p)
            .collect();
        if !matches.device_ids.contains(&device.id) && points.is_empty() {
            continue;
        }
        println!("  {} (slave {}) [{}]", device.name, device.slave_id, device.id);
        for point in &device.datapoints {
            if !points.iter().any(|p| *p == &point.id) {
                continue;
            }
            let function = FunctionCode::from_code(point.function)
                .map(|code| code.label())
                .unwrap_or("unknown function");
            println!(
                "    {} F{} ({}) @ {} | {} x{} {}",
                point.id,
                point.function,
                function,
                format_address(point.address as i64, AddressFormat::Hex),
                point.address,
                point.count,
                point.data_type,
            );
        }
    }
    Ok(())
}
