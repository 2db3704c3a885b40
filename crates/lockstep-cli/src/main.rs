//! `lockstep` command line: run one of the bundled benches and report.
//!
//! The harness runs on a current-thread runtime with paused time, so a run
//! is deterministic for a given seed and finishes as fast as the host can
//! step it.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lockstep_benches::{run_bench, BenchKind};
use lockstep_core::{HarnessConfig, RandomizeFailurePolicy, RunReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "lockstep",
    version,
    about = "Transaction-level verification harness",
    long_about = "Run a bundled bench (mux, dff, fifo) through the generator, driver, monitor and scoreboard.\n\nExamples:\n  lockstep run fifo --iterations 200\n  lockstep run dff --seed 7 --json\n  lockstep run mux --inject-fault"
)]
struct Cli {
    /// Only log warnings and errors; drops per-item diagnostics.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one bench.
    Run {
        /// Bench to run: mux, dff or fifo.
        bench: BenchKind,

        /// JSON config file; flags below override it.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of transactions to generate.
        #[arg(short = 'n', long)]
        iterations: Option<u64>,

        #[arg(short, long)]
        seed: Option<u64>,

        /// Skip transactions that fail to randomize instead of aborting.
        #[arg(long)]
        skip_randomize_failures: bool,

        /// Run the bench against its faulty device variant.
        #[arg(long)]
        inject_fault: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the available benches.
    List,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let outcome = match cli.command {
        Commands::Run {
            bench,
            config,
            iterations,
            seed,
            skip_randomize_failures,
            inject_fault,
            json,
        } => load_config(config, iterations, seed, skip_randomize_failures)
            .and_then(|config| cmd_run(bench, config, inject_fault, json)),
        Commands::List => {
            for kind in BenchKind::ALL {
                println!("{kind}");
            }
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(2);
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(
    path: Option<PathBuf>,
    iterations: Option<u64>,
    seed: Option<u64>,
    skip_randomize_failures: bool,
) -> Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => HarnessConfig::from_path(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    if let Some(iterations) = iterations {
        config.iterations = iterations;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }
    if skip_randomize_failures {
        config.on_randomize_failure = RandomizeFailurePolicy::Skip;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Returns whether the run passed.
fn cmd_run(bench: BenchKind, config: HarnessConfig, inject_fault: bool, json: bool) -> Result<bool> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .context("building runtime")?;

    let report = runtime
        .block_on(run_bench(bench, config, inject_fault))
        .with_context(|| format!("running bench {bench}"))?;

    print_report(&report, json)?;
    Ok(report.passed())
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("serializing report")?
        );
    } else {
        println!("{report}");
    }
    Ok(())
}
