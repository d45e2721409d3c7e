use std::io::Write;
use std::path::Path;

use anyhow::Result;
use primes_core::PrimeStore;
use primes_core::shard::{StoreSummary, shard_filename};

use super::StoreArgs;
use crate::output::{self, OutputMode, dec_hex, pretty_kv, pretty_section};

/// Summarize the store from file sizes and the last shard's tail.
///
/// # Errors
///
/// Fails on config errors, unreadable shards, or a width gap.
pub fn run_status(args: &StoreArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = args.resolve(output, project_root)?;
    let store = PrimeStore::open(config.store_path(project_root));
    let summary = store
        .summary()
        .map_err(|err| output::reported_code(output, &err, err.code()))?;

    output::render_mode(output, &summary, render_text, render_pretty)
}

fn render_text(summary: &StoreSummary, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "store={}", summary.dir.display())?;
    writeln!(w, "exists={}", summary.exists)?;
    for shard in &summary.shards {
        writeln!(
            w,
            "shard={} entries={} bytes={} sealed={} manifest={}",
            shard_filename(shard.width),
            shard.entries,
            shard.bytes,
            shard.sealed,
            shard.has_manifest
        )?;
    }
    writeln!(w, "total={}", summary.total)?;
    if let Some(largest) = summary.largest {
        writeln!(w, "largest={largest}")?;
    }
    Ok(())
}

fn render_pretty(summary: &StoreSummary, w: &mut dyn Write) -> std::io::Result<()> {
    if !summary.exists {
        return writeln!(
            w,
            "No store at {}; `primes run` will start a new one.",
            summary.dir.display()
        );
    }

    pretty_section(w, &format!("Store {}", summary.dir.display()))?;
    for shard in &summary.shards {
        let state = match (shard.sealed, shard.has_manifest) {
            (true, true) => "sealed",
            (true, false) => "sealed, no manifest",
            (false, _) => "active",
        };
        writeln!(
            w,
            "  {:<16} {:>12} primes {:>14} bytes  ({state})",
            shard_filename(shard.width),
            shard.entries,
            shard.bytes
        )?;
    }
    writeln!(w)?;
    pretty_kv(w, "total", summary.total.to_string())?;
    let largest = summary
        .largest
        .map_or_else(|| "-".to_string(), dec_hex);
    pretty_kv(w, "largest", largest)
}
