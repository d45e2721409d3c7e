use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use primes_core::PrimeStore;
use primes_core::shard::{ShardSummary, VerifyReport, shard_filename};
use serde::Serialize;

use super::StoreArgs;
use crate::output::{self, OutputMode};

#[derive(Debug, Serialize)]
struct Problem {
    error_code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct VerifyOutput {
    store: PathBuf,
    ok: bool,
    checked: u64,
    shards: Vec<ShardSummary>,
    problems: Vec<Problem>,
}

impl VerifyOutput {
    fn new(store: PathBuf, report: VerifyReport) -> Self {
        Self {
            store,
            ok: report.is_clean(),
            checked: report.checked,
            shards: report.shards,
            problems: report
                .problems
                .iter()
                .map(|p| Problem {
                    error_code: p.code().code(),
                    message: p.to_string(),
                })
                .collect(),
        }
    }
}

/// Run a full integrity pass over the store.
///
/// # Errors
///
/// Returns an error when any check fails or a shard cannot be read.
pub fn run_verify(args: &StoreArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = args.resolve(output, project_root)?;
    let dir = config.store_path(project_root);
    let store = PrimeStore::open(&dir);
    let report = store
        .verify()
        .map_err(|err| output::reported_code(output, &err, err.code()))?;

    let result = VerifyOutput::new(dir, report);
    output::render_mode(output, &result, render_lines, render_lines)?;

    if result.ok {
        Ok(())
    } else {
        anyhow::bail!("verify: failed");
    }
}

fn render_lines(result: &VerifyOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let status = if result.ok { "OK  " } else { "SCAN" };
    for shard in &result.shards {
        writeln!(
            w,
            "{status} {} ({} primes)",
            shard_filename(shard.width),
            shard.entries
        )?;
    }
    for problem in &result.problems {
        writeln!(w, "FAIL [{}] {}", problem.error_code, problem.message)?;
    }
    if result.ok {
        writeln!(w, "verify: success ({} primes checked)", result.checked)
    } else {
        writeln!(w, "verify: {} problem(s)", result.problems.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primes_core::StoreError;

    #[test]
    fn problems_keep_their_codes() {
        let report = VerifyReport {
            shards: Vec::new(),
            checked: 0,
            problems: vec![StoreError::Gap {
                missing: 1,
                width: 2,
            }],
        };
        let out = VerifyOutput::new(PathBuf::from("primes"), report);
        assert!(!out.ok);
        assert_eq!(out.problems[0].error_code, "E3006");

        let mut buf = Vec::new();
        render_lines(&out, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("FAIL [E3006]"));
        assert!(text.contains("verify: 1 problem(s)"));
    }

    #[test]
    fn clean_report_says_success() {
        let report = VerifyReport {
            shards: vec![ShardSummary {
                width: 1,
                entries: 4,
                bytes: 4,
                sealed: false,
                has_manifest: false,
            }],
            checked: 4,
            problems: Vec::new(),
        };
        let out = VerifyOutput::new(PathBuf::from("primes"), report);
        let mut buf = Vec::new();
        render_lines(&out, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("OK   primes_1.bin (4 primes)"));
        assert!(text.contains("verify: success (4 primes checked)"));
    }
}
