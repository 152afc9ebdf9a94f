//! LaborMap CLI — fetch state labor statistics and inspect the dataset.
//!
//! Commands:
//! - `fetch` — run the wage and unemployment phases against the BLS API
//! - `status` — coverage and ranking of the persisted dataset
//! - `ids` — print the series identifiers a run would request (offline)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use labormap_core::data::{BlsClient, Dataset, DatasetStore, Metric, QuotaLatch};
use labormap_core::pipeline::primary_ids;
use labormap_core::{Orchestrator, Phase, PhaseOutcome, PipelineConfig, Region, RunSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "labormap",
    about = "LaborMap CLI — state unemployment and software developer wage dataset"
)]
struct Cli {
    /// TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the latest values and merge them into the dataset.
    Fetch {
        /// Phases to run, in order. Defaults to wage then unemployment.
        #[arg(long = "phase", value_enum)]
        phases: Vec<PhaseArg>,

        /// Dataset file (overrides config).
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Mirror directory (overrides config).
        #[arg(long, conflicts_with = "no_mirror")]
        mirror_dir: Option<PathBuf>,

        /// Skip the mirror copy.
        #[arg(long, default_value_t = false)]
        no_mirror: bool,
    },
    /// Report coverage and ranking for the persisted dataset.
    Status {
        /// Dataset file (overrides config).
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Read path used when the dataset file does not exist (overrides config).
        #[arg(long)]
        fallback: Option<PathBuf>,

        /// Number of ranked regions to print per metric.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Print the series identifiers for a phase.
    Ids {
        #[arg(long, value_enum, default_value_t = PhaseArg::Wage)]
        phase: PhaseArg,

        /// Postal codes (e.g. CA TX). Defaults to all 49 regions.
        regions: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PhaseArg {
    Wage,
    Unemployment,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Wage => Phase::Wage,
            PhaseArg::Unemployment => Phase::Unemployment,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Fetch {
            phases,
            dataset,
            mirror_dir,
            no_mirror,
        } => run_fetch(config, phases, dataset, mirror_dir, no_mirror),
        Commands::Status {
            dataset,
            fallback,
            top,
        } => run_status(&config, dataset, fallback, top),
        Commands::Ids { phase, regions } => run_ids(&config, phase.into(), &regions),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_fetch(
    mut config: PipelineConfig,
    phases: Vec<PhaseArg>,
    dataset: Option<PathBuf>,
    mirror_dir: Option<PathBuf>,
    no_mirror: bool,
) -> Result<()> {
    if let Some(path) = dataset {
        config.dataset.path = path;
    }
    if mirror_dir.is_some() {
        config.dataset.mirror_dir = mirror_dir;
    }
    if no_mirror {
        config.dataset.mirror_dir = None;
    }

    let phases: Vec<Phase> = if phases.is_empty() {
        Phase::ALL.to_vec()
    } else {
        phases.into_iter().map(Phase::from).collect()
    };

    let key = config.api.registration_key();
    if key.is_none() {
        info!(
            env = %config.api.api_key_env,
            "no registration key set, using unregistered limits"
        );
    }

    let latch = Arc::new(QuotaLatch::new());
    let client = BlsClient::new(&config.api, key, latch)?;
    let store = DatasetStore::new(&config.dataset.path, config.dataset.mirror_dir.clone());

    let summary = Orchestrator::new(&client, &store, &config).run(&phases)?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("=== Fetch Summary ===");
    for (phase, outcome) in &summary.phases {
        match outcome {
            PhaseOutcome::Updated {
                resolved,
                via_fallback,
                unresolved,
                quota_stop,
                report,
            } => {
                println!(
                    "{:<14} {resolved}/{} resolved ({via_fallback} via fallback)",
                    phase.to_string(),
                    Region::all().len()
                );
                if !unresolved.is_empty() {
                    let codes: Vec<&str> = unresolved.iter().map(|r| r.postal()).collect();
                    println!("{:<14} null: {}", "", codes.join(" "));
                }
                if quota_stop.is_some() {
                    println!("{:<14} fallback stopped early: quota exceeded", "");
                }
                println!("{:<14} wrote {}", "", report.path.display());
                if let Some(mirror) = &report.mirrored_to {
                    println!("{:<14} mirrored to {}", "", mirror.display());
                }
            }
            PhaseOutcome::PreservedOnQuota { message, .. } => {
                println!(
                    "{:<14} quota exceeded, existing data preserved ({message})",
                    phase.to_string()
                );
            }
        }
    }
}

fn run_status(
    config: &PipelineConfig,
    dataset: Option<PathBuf>,
    fallback: Option<PathBuf>,
    top: usize,
) -> Result<()> {
    let path = dataset.unwrap_or_else(|| config.dataset.path.clone());
    let fallback = fallback.or_else(|| config.dataset.fallback_read_path.clone());

    let (ds, read_from) = match &fallback {
        Some(fb) => DatasetStore::load_with_fallback(&path, fb)?,
        None => {
            let ds = DatasetStore::new(&path, None).load()?;
            (ds, path.is_file().then(|| path.clone()))
        }
    };

    match &read_from {
        Some(read) => {
            println!("Dataset: {}", read.display());
            if *read != path {
                println!("(read from fallback; {} not present)", path.display());
            }
            print_file_info(read)?;
        }
        None => println!("Dataset: {} (file not present)", path.display()),
    }
    if ds.is_empty() {
        println!("Dataset is empty.");
        return Ok(());
    }
    println!("Regions: {}", ds.len());

    for metric in Metric::ALL {
        print_metric(&ds, metric, top);
    }
    Ok(())
}

fn print_file_info(path: &Path) -> Result<()> {
    let Some(digest) = DatasetStore::new(path, None).digest()? else {
        return Ok(());
    };
    let modified: chrono::DateTime<chrono::Local> = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .into();
    println!("Modified: {}", modified.format("%Y-%m-%d %H:%M:%S"));
    println!("BLAKE3:   {}", &digest[..16]);
    Ok(())
}

fn print_metric(ds: &Dataset, metric: Metric, top: usize) {
    let coverage = ds.coverage(metric);
    println!();
    println!(
        "{}: {}/{} regions",
        metric.field_name(),
        coverage.populated,
        coverage.total
    );
    if !coverage.is_complete() {
        let codes: Vec<&str> = coverage.missing.iter().map(|r| r.postal()).collect();
        println!("  missing: {}", codes.join(" "));
    }
    println!("  {:<4} {:<6} {:>12}", "Rank", "Region", "Value");
    println!("  {}", "-".repeat(24));
    for (i, (region, value)) in ds.ranking(metric).iter().take(top).enumerate() {
        let shown = match metric {
            Metric::SoftwareDeveloperWage => format!("${value:.0}"),
            Metric::UnemploymentRate => format!("{value:.1}%"),
        };
        println!("  {:<4} {:<6} {:>12}", i + 1, region.postal(), shown);
    }
}

fn run_ids(config: &PipelineConfig, phase: Phase, regions: &[String]) -> Result<()> {
    let wanted: Vec<Region> = regions
        .iter()
        .map(|code| Region::from_postal(code))
        .collect::<Result<_, _>>()?;

    for (region, id) in primary_ids(config, phase) {
        if wanted.is_empty() || wanted.contains(&region) {
            println!("{}\t{}\t{}", region.postal(), region.fips(), id);
        }
    }
    Ok(())
}
