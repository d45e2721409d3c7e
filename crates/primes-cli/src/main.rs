#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "primes: resumable trial-division prime search",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress lines during a run.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Defaults to `run` when omitted.
    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    /// Derive the output mode from flags and environment.
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Resume the search and extend the store",
        long_about = "Load the store, continue trial division from the largest known prime, \
                      and checkpoint every batch of new primes.",
        after_help = "EXAMPLES:\n    # Resume from ./primes up to the default bound\n    primes run\n\n    # Stop below one million, checkpointing every 1000 primes\n    primes run --limit 1000000 --batch-size 1000\n\n    # Use another store and fsync every append\n    primes run --store /data/primes --durable"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        about = "Summarize the store without loading it",
        long_about = "Report per-shard counts and the largest stored prime from file sizes \
                      and the tail of the widest shard.",
        after_help = "EXAMPLES:\n    # Show the default store\n    primes status\n\n    # Emit machine-readable output\n    primes status --json"
    )]
    Status(cmd::StoreArgs),

    #[command(
        about = "Check every shard for format violations",
        long_about = "Decode every shard, checking widths, ordering, gaps, and sealed-shard \
                      manifests. Exits non-zero on any finding.",
        after_help = "EXAMPLES:\n    # Verify the default store\n    primes verify\n\n    # Emit machine-readable output\n    primes verify --json"
    )]
    Verify(cmd::StoreArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("PRIMES_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "primes=debug,info"
        } else {
            "primes=info,warn"
        })
    });

    let format = env::var("PRIMES_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    match cli.command.unwrap_or_default() {
        Commands::Run(args) => cmd::run::run_run(&args, cli.quiet, output, &project_root),
        Commands::Status(args) => cmd::status::run_status(&args, output, &project_root),
        Commands::Verify(args) => cmd::verify::run_verify(&args, output, &project_root),
    }
}

impl Default for Commands {
    fn default() -> Self {
        Self::Run(cmd::run::RunArgs::default())
    }
}
