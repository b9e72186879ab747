//! Runs one coordination scenario and narrates it through `tracing`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use coord_scenarios::{
    run_catalog, run_print_queue, run_studio, verify_catalog, verify_print_queue, verify_studio,
    ArcStatsSink, CatalogConfig, CheckResult, Pacing, PrintQueueConfig, PriorityPolicy,
    StatsSink, StudioConfig,
};
use serde::de::DeserializeOwned;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Producer/consumer, resource ring and reader/writer scenarios")]
struct Cli {
    /// Tracing filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log: String,

    /// Disable every random pause
    #[arg(long, global = true)]
    fast: bool,

    /// JSON file providing the scenario configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Applications feed a bounded print queue drained by printers
    PrintQueue(PrintQueueArgs),
    /// Editors share the processing boards on either side of their seat
    Studio(StudioArgs),
    /// Customers browse a catalog while clerks update it
    Catalog(CatalogArgs),
}

#[derive(Args, Debug)]
struct PrintQueueArgs {
    #[arg(long)]
    capacity: Option<usize>,
    #[arg(long)]
    producers: Option<u32>,
    #[arg(long)]
    consumers: Option<u32>,
    #[arg(long)]
    docs: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct StudioArgs {
    #[arg(long)]
    editors: Option<usize>,
    #[arg(long)]
    sessions: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    Readers,
    Writers,
}

impl From<Policy> for PriorityPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Readers => PriorityPolicy::ReaderPreference,
            Policy::Writers => PriorityPolicy::WriterPreference,
        }
    }
}

#[derive(Args, Debug)]
struct CatalogArgs {
    #[arg(long)]
    readers: Option<u32>,
    #[arg(long)]
    writers: Option<u32>,
    #[arg(long)]
    reads: Option<u32>,
    #[arg(long)]
    writes: Option<u32>,
    #[arg(long)]
    products: Option<u32>,
    /// Which side wins when readers and writers contend
    #[arg(long, value_enum)]
    priority: Option<Policy>,
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let verdict = match &cli.command {
        Command::PrintQueue(args) => print_queue(&cli, args)?,
        Command::Studio(args) => studio(&cli, args)?,
        Command::Catalog(args) => catalog(&cli, args)?,
    };

    match verdict {
        Ok(()) => {
            info!("scenario verified");
            Ok(ExitCode::SUCCESS)
        }
        Err(reason) => {
            error!("scenario check failed: {reason}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_queue(cli: &Cli, args: &PrintQueueArgs) -> Result<CheckResult> {
    let mut config: PrintQueueConfig = load_config(cli.config.as_deref())?;
    override_with(&mut config.capacity, args.capacity);
    override_with(&mut config.producers, args.producers);
    override_with(&mut config.consumers, args.consumers);
    override_with(&mut config.docs_per_producer, args.docs);
    override_with(&mut config.seed, args.seed);
    if cli.fast {
        config.pacing = Pacing::IMMEDIATE;
    }
    info!(?config, "starting print queue");

    let stats = ArcStatsSink::default();
    let report = run_print_queue(&config, stats.clone()).context("print queue run failed")?;
    let snapshot = stats.snapshot();
    for (printer, docs) in report.printed.iter().enumerate() {
        info!(printer, printed = docs.len(), "printer summary");
    }
    info!(
        inserted = report.metrics.inserted,
        insert_waits = report.metrics.insert_waits,
        remove_waits = report.metrics.remove_waits,
        peak_len = report.metrics.peak_len,
        "queue summary"
    );
    Ok(verify_print_queue(&report, &snapshot, &config))
}

fn studio(cli: &Cli, args: &StudioArgs) -> Result<CheckResult> {
    let mut config: StudioConfig = load_config(cli.config.as_deref())?;
    override_with(&mut config.editors, args.editors);
    override_with(&mut config.sessions_per_editor, args.sessions);
    override_with(&mut config.seed, args.seed);
    if cli.fast {
        config.pacing = Pacing::IMMEDIATE;
    }
    info!(?config, "starting studio");

    let stats = ArcStatsSink::default();
    let report = run_studio(&config, stats.clone()).context("studio run failed")?;
    let snapshot = stats.snapshot();
    info!(
        grants = ?report.final_state.grants,
        peak_active = snapshot.peak_active,
        "studio summary"
    );
    Ok(verify_studio(&report, &snapshot, &config))
}

fn catalog(cli: &Cli, args: &CatalogArgs) -> Result<CheckResult> {
    let mut config: CatalogConfig = load_config(cli.config.as_deref())?;
    override_with(&mut config.readers, args.readers);
    override_with(&mut config.writers, args.writers);
    override_with(&mut config.reads_per_reader, args.reads);
    override_with(&mut config.writes_per_writer, args.writes);
    override_with(&mut config.products, args.products);
    override_with(&mut config.priority, args.priority.map(PriorityPolicy::from));
    override_with(&mut config.seed, args.seed);
    if cli.fast {
        config.reader_pacing = Pacing::IMMEDIATE;
        config.writer_pacing = Pacing::IMMEDIATE;
    }
    info!(?config, "starting catalog");

    let stats = ArcStatsSink::default();
    let report = run_catalog(&config, stats.clone()).context("catalog run failed")?;
    let snapshot = stats.snapshot();
    info!(
        priority = ?report.priority,
        reads = snapshot.consumed,
        writes = snapshot.produced,
        peak_readers = snapshot.peak_active,
        total_stock = report.catalog.total_stock(),
        "catalog summary"
    );
    Ok(verify_catalog(&report, &snapshot, &config))
}

fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
}

fn override_with<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt().with_env_filter(env_filter).with_thread_names(true).try_init();
}
