use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use clap::Args;
use primes_core::config::Overrides;
use primes_core::io::FsIo;
use primes_core::lock::StoreLock;
use primes_core::sieve::{Progress, RunSummary};
use primes_core::{PrimeStore, Sieve};
use serde::Serialize;

use super::StoreArgs;
use crate::output::{self, OutputMode, dec_hex, pretty_kv, pretty_section};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Exclusive ceiling on tested candidates (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u64)]
    pub limit: Option<u64>,

    /// New primes between checkpoints.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Sync every shard append to disk.
    #[arg(long)]
    pub durable: bool,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            store_dir: self.store.store.clone(),
            batch_size: self.batch_size,
            upper_bound: self.limit,
            durable: self.durable,
        }
    }
}

fn parse_u64(raw: &str) -> Result<u64, String> {
    let parsed = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .map_or_else(
            || raw.replace('_', "").parse(),
            |hex| u64::from_str_radix(hex, 16),
        );
    parsed.map_err(|err| format!("invalid number '{raw}': {err}"))
}

#[derive(Debug, Serialize)]
struct RunReport {
    store: PathBuf,
    /// Primes on disk before this run.
    resumed_from: usize,
    started_at: u64,
    limit: u64,
    #[serde(flatten)]
    summary: RunSummary,
}

/// Resume the search under the store lock and report what it found.
///
/// # Errors
///
/// Fails on config errors, lock contention, or any store error. Format
/// violations in the store abort before the search starts.
pub fn run_run(args: &RunArgs, quiet: bool, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = super::resolve(output, project_root, args.overrides())?;
    let dir = config.store_path(project_root);
    let io = if config.durable {
        FsIo::durable()
    } else {
        FsIo::new()
    };
    let store = PrimeStore::new(&dir, io);

    let _lock = StoreLock::acquire(&store.lock_path(), config.lock_timeout())
        .map_err(|err| output::reported_code(output, &err, err.code()))?;

    let mut sieve = Sieve::resume(store, config.batch_size)
        .map_err(|err| output::reported_code(output, &err, err.code()))?;
    let resumed_from = sieve.saved_len();
    let started_at = sieve.next_candidate();

    let chatty = !quiet && !output.is_json();
    if chatty {
        println!("Have already computed {resumed_from} primes");
        println!("Starting at: {}", dec_hex(started_at));
    }

    let stop = AtomicBool::new(false);
    let summary = sieve
        .run(config.upper_bound, &stop, |progress: Progress| {
            if chatty {
                println!(
                    "We now have {} primes! (largest {})",
                    progress.count,
                    dec_hex(progress.largest)
                );
            }
        })
        .map_err(|err| output::reported_code(output, &err, err.code()))?;

    let report = RunReport {
        store: dir,
        resumed_from,
        started_at,
        limit: config.upper_bound,
        summary,
    };

    output::render_mode(output, &report, render_text, render_pretty)
}

fn render_text(report: &RunReport, w: &mut dyn Write) -> std::io::Result<()> {
    let s = &report.summary;
    writeln!(w, "store={}", report.store.display())?;
    writeln!(w, "resumed_from={}", report.resumed_from)?;
    writeln!(w, "discovered={}", s.discovered)?;
    writeln!(w, "total={}", s.total)?;
    if let Some(largest) = s.largest {
        writeln!(w, "largest={largest}")?;
    }
    writeln!(w, "checkpoints={}", s.checkpoints)?;
    writeln!(w, "next_candidate={}", s.next_candidate)?;
    writeln!(w, "stopped={}", s.stopped)
}

fn render_pretty(report: &RunReport, w: &mut dyn Write) -> std::io::Result<()> {
    let s = &report.summary;
    writeln!(w)?;
    pretty_section(w, "Run complete")?;
    pretty_kv(w, "store", report.store.display().to_string())?;
    pretty_kv(w, "discovered", s.discovered.to_string())?;
    pretty_kv(w, "total", s.total.to_string())?;
    if let Some(largest) = s.largest {
        pretty_kv(w, "largest", dec_hex(largest))?;
    }
    pretty_kv(w, "checkpoints", s.checkpoints.to_string())?;
    pretty_kv(w, "next", dec_hex(s.next_candidate))?;
    if s.stopped {
        pretty_kv(w, "stopped", "yes")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u64_accepts_decimal_hex_and_underscores() {
        assert_eq!(parse_u64("1000"), Ok(1000));
        assert_eq!(parse_u64("1_000_000"), Ok(1_000_000));
        assert_eq!(parse_u64("0xFFFF"), Ok(65_535));
        assert_eq!(parse_u64("0X10"), Ok(16));
        assert!(parse_u64("ten").is_err());
        assert!(parse_u64("0xZZ").is_err());
    }

    #[test]
    fn overrides_carry_every_flag() {
        let args = RunArgs {
            store: StoreArgs {
                store: Some(PathBuf::from("p")),
            },
            limit: Some(50),
            batch_size: Some(4),
            durable: true,
        };
        let o = args.overrides();
        assert_eq!(o.store_dir, Some(PathBuf::from("p")));
        assert_eq!(o.upper_bound, Some(50));
        assert_eq!(o.batch_size, Some(4));
        assert!(o.durable);
    }

    #[test]
    fn text_report_lists_summary_fields() {
        let report = RunReport {
            store: PathBuf::from("primes"),
            resumed_from: 0,
            started_at: 3,
            limit: 50,
            summary: RunSummary {
                discovered: 14,
                total: 15,
                largest: Some(47),
                checkpoints: 0,
                next_candidate: 51,
                stopped: false,
            },
        };
        let mut buf = Vec::new();
        render_text(&report, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("total=15\n"));
        assert!(text.contains("largest=47\n"));
        assert!(text.contains("next_candidate=51\n"));
    }
}
