//! Resume tests against a real store directory.
//!
//! These exercise the full load → search → checkpoint → reload cycle the
//! binary goes through across restarts, plus the failure modes a crashed or
//! hand-edited store can present.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use primes_core::error::ErrorCode;
use primes_core::io::FsIo;
use primes_core::shard::{PrimeStore, StoreError};
use primes_core::sieve::{Sieve, SieveError};
use tempfile::TempDir;

fn naive_primes_below(limit: u64) -> Vec<u64> {
    (2..limit)
        .filter(|&n| (2..n).take_while(|d| d * d <= n).all(|d| n % d != 0))
        .collect()
}

fn run_to(store: PrimeStore<FsIo>, batch: usize, bound: u64) -> Sieve<FsIo> {
    let mut sieve = Sieve::resume(store, batch).expect("resume");
    sieve
        .run(bound, &AtomicBool::new(false), |_| {})
        .expect("run");
    sieve
}

#[test]
fn restarts_accumulate_the_same_primes_as_one_run() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("primes");

    for bound in [100, 1_000, 20_000, 70_000] {
        run_to(PrimeStore::open(&dir), 64, bound);
    }

    let loaded = PrimeStore::open(&dir).load().expect("load");
    assert_eq!(loaded.as_slice(), naive_primes_below(70_000).as_slice());

    // 2..=251 in one byte, 257..=65521 in two, 65537.. in three.
    let one = fs::read(dir.join("primes_1.bin")).expect("shard 1");
    let two = fs::read(dir.join("primes_2.bin")).expect("shard 2");
    let three = fs::read(dir.join("primes_3.bin")).expect("shard 3");
    assert_eq!(one.len(), 54);
    assert_eq!(two.len(), 2 * (6_542 - 54));
    assert_eq!(three.len() % 3, 0);
    assert_eq!(&three[..3], &[0x01, 0x00, 0x01]);
    assert!(dir.join("primes_1.manifest").exists());
    assert!(dir.join("primes_2.manifest").exists());
    assert!(!dir.join("primes_3.manifest").exists());
}

#[test]
fn stop_mid_run_then_resume_loses_nothing() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("primes");
    let stop = AtomicBool::new(false);

    let mut first = Sieve::resume(PrimeStore::open(&dir), 10).expect("resume");
    let summary = first
        .run(u64::MAX, &stop, |progress| {
            if progress.count >= 50 {
                stop.store(true, Ordering::Relaxed);
            }
        })
        .expect("run");
    assert!(summary.stopped);
    let stopped_at = summary.next_candidate;
    drop(first);

    let second = Sieve::resume(PrimeStore::open(&dir), 10).expect("resume");
    assert_eq!(second.next_candidate(), stopped_at);
    assert_eq!(second.primes().len(), 50);

    let finished = run_to(PrimeStore::open(&dir), 10, 1_000);
    assert_eq!(
        finished.primes().as_slice(),
        naive_primes_below(1_000).as_slice()
    );
}

#[test]
fn interrupted_before_final_save_keeps_last_checkpoint() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("primes");

    // Stand in for a process killed right after the first checkpoint: the
    // store holds exactly that batch and nothing after it.
    let mut sieve = Sieve::resume(PrimeStore::open(&dir), 4).expect("resume");
    sieve.run(8, &AtomicBool::new(false), |_| {}).expect("run");
    drop(sieve);

    assert_eq!(
        fs::read(dir.join("primes_1.bin")).expect("shard"),
        vec![2, 3, 5, 7]
    );

    let resumed = run_to(PrimeStore::open(&dir), 4, 50);
    assert_eq!(
        resumed.primes().as_slice(),
        &[2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47]
    );
}

#[test]
fn torn_tail_is_a_fatal_format_violation() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("primes");
    run_to(PrimeStore::open(&dir), 100, 1_000);

    {
        let mut f = OpenOptions::new()
            .append(true)
            .open(dir.join("primes_2.bin"))
            .expect("open");
        f.write_all(&[0x04]).expect("write");
    }

    let err = Sieve::resume(PrimeStore::open(&dir), 100)
        .err()
        .expect("misaligned shard must fail");
    assert!(matches!(
        err,
        SieveError::Store(StoreError::Misaligned { width: 2, .. })
    ));
    assert_eq!(err.code(), ErrorCode::ShardSizeMisaligned);
}

#[test]
fn foreign_shard_with_composite_width_is_rejected() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("primes");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("primes_1.bin"), [2_u8, 3]).expect("write");
    fs::write(dir.join("primes_2.bin"), [0x00_u8, 0x05]).expect("write");

    let err = PrimeStore::open(&dir).load().expect_err("width mismatch");
    assert_eq!(err.code(), ErrorCode::ShardWidthMismatch);
    assert!(err.is_format_violation());
}

#[test]
fn sealed_shards_are_never_appended_after_sealing() {
    let tmp = TempDir::new().expect("tempdir");
    let dir = tmp.path().join("primes");
    run_to(PrimeStore::open(&dir), 16, 300);
    let sealed = fs::read(dir.join("primes_1.bin")).expect("shard 1");

    run_to(PrimeStore::open(&dir), 16, 5_000);
    assert_eq!(fs::read(dir.join("primes_1.bin")).expect("shard 1"), sealed);

    let report = PrimeStore::open(&dir).verify().expect("verify");
    assert!(report.is_clean(), "{:?}", report.problems);
}
