//! Relabel Ground Truth CLI
//!
//! Rewrites a lineage graph into the ids of a second labeling, or lays out a
//! synthetic dataset to try it on.

use clap::{Args, Parser, Subcommand};
use relabel_cli::{export, generate, identity_pairs, SynthConfig};
use relabel_core::{ReconcileConfig, Reconciler, RepresentativePolicy};
use relabel_env::{DirectoryStore, StoreLayout, Timestep, TimestepKeyFormat};
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Ground-truth relabeling tool
#[derive(Parser, Debug)]
#[command(name = "relabel-gt")]
#[command(about = "Re-express a tracking lineage in the ids of another labeling", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate the lineage of every timestep in a range
    Run(RunArgs),

    /// Write a synthetic dataset in the directory layout
    Synth(SynthArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Folder where the per-timestep ground truth records are created
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Root holding `labels/` and `tracking/` of the input labeling
    #[arg(short, long)]
    input_lineage: PathBuf,

    /// Directory holding the output label volumes
    #[arg(short = 'l', long)]
    output_labels: PathBuf,

    /// First timestep
    #[arg(short, long, default_value = "0")]
    start: Timestep,

    /// Last timestep (default: last one in the lineage source)
    #[arg(short, long)]
    end: Option<Timestep>,

    /// Timestep key format, e.g. "{0:03d}" renders 4 as 004
    #[arg(long, default_value = "{0:03d}")]
    key_format: TimestepKeyFormat,

    /// Representative policy (smallest_id, largest_overlap)
    #[arg(short, long, default_value = "smallest_id")]
    policy: RepresentativePolicy,

    /// JSON run summary on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SynthArgs {
    /// Master seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of timesteps
    #[arg(short, long, default_value = "10")]
    timesteps: u32,

    /// Grid width
    #[arg(long, default_value = "64")]
    width: usize,

    /// Grid height
    #[arg(long, default_value = "64")]
    height: usize,

    /// Objects at t=0
    #[arg(long, default_value = "6")]
    objects: usize,

    /// Destination root (`input/` and `output/` are created underneath)
    #[arg(short, long)]
    out: PathBuf,

    /// Timestep key format of the written files
    #[arg(long, default_value = "{0:03d}")]
    key_format: TimestepKeyFormat,
}

fn run(args: RunArgs) -> i32 {
    let layout = StoreLayout::new(&args.output_dir, &args.input_lineage, &args.output_labels)
        .with_key_format(args.key_format);
    let config = ReconcileConfig {
        start: args.start,
        end: args.end,
        policy: args.policy,
    };

    let mut reconciler = Reconciler::new(DirectoryStore::new(layout), config);
    match reconciler.run() {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to render summary: {}", e);
                        return 1;
                    }
                }
            } else {
                let outcomes = summary.outcomes();
                info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
                info!(
                    "✓ {} timesteps written to {}",
                    summary.timesteps.len(),
                    args.output_dir.display()
                );
                info!(
                    "  raw events: {} translated, {} appeared, {} vanished, {} demoted, {} dropped",
                    outcomes.translated,
                    outcomes.appeared,
                    outcomes.vanished,
                    outcomes.demoted,
                    outcomes.dropped
                );
            }
            0
        }
        Err(e) => {
            if args.json {
                let report = serde_json::json!({
                    "failed_timestep": e.timestep(),
                    "kind": e.kind(),
                    "error": e.to_string(),
                });
                println!("{}", report);
            }
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {}", cause);
                source = cause.source();
            }
            1
        }
    }
}

fn synth(args: SynthArgs) -> i32 {
    let config = SynthConfig {
        seed: args.seed,
        timesteps: args.timesteps,
        width: args.width,
        height: args.height,
        objects: args.objects,
        ..Default::default()
    };

    let dataset = generate(&config);
    for t in 0..config.timesteps {
        debug!("t={} identities {:?}", t, identity_pairs(&dataset, t));
    }

    let layout = StoreLayout::new(
        args.out.join("gt"),
        args.out.join("input"),
        args.out.join("output"),
    )
    .with_key_format(args.key_format);
    let target = DirectoryStore::new(layout);

    match export(&dataset, &target) {
        Ok(files) => {
            info!(
                "✓ seed={} wrote {} files under {}",
                config.seed,
                files,
                args.out.display()
            );
            info!(
                "Reconcile with: relabel-gt run -i {} -l {} -o {}",
                args.out.join("input").display(),
                args.out.join("output").display(),
                args.out.join("gt").display()
            );
            0
        }
        Err(e) => {
            error!("Failed to write dataset: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let code = match cli.command {
        Command::Run(args) => run(args),
        Command::Synth(args) => synth(args),
    };

    std::process::exit(code);
}
