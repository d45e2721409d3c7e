//! Trial-division search engine with checkpointing.
//!
//! The engine owns the in-memory [`PrimeSequence`] and extends it one odd
//! candidate at a time:
//!
//! 1. **Resume**: load the store. An empty store is seeded with `[2]` and
//!    the search starts at 3; otherwise it starts at the next odd number
//!    after the largest known prime.
//! 2. **Search**: each candidate is divided by known primes up to a cheap
//!    bit-length bound on its square root, stopping at the first divisor.
//! 3. **Checkpoint**: every `batch_size` new primes the full sequence is
//!    handed to the store, which appends only what is new.
//! 4. **Shutdown**: when the loop ends for any reason, one final save.
//!
//! Known primes below `√i` are always present because the sequence is built
//! strictly in increasing order.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info};

use crate::codec::highest_bit;
use crate::error::ErrorCode;
use crate::io::ShardIo;
use crate::sequence::{OutOfOrder, PrimeSequence};
use crate::shard::{PrimeStore, SaveReport, StoreError};

/// Exclusive candidate ceiling of the canonical run.
pub const DEFAULT_UPPER_BOUND: u64 = 0xFFFF_FFFF;

/// Primes found between checkpoints in the canonical run.
pub const DEFAULT_BATCH_SIZE: usize = 4096 * 4;

/// Errors that end a search run.
#[derive(Debug, thiserror::Error)]
pub enum SieveError {
    /// Loading or saving the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The resume point came out even.
    #[error("search would start on even candidate {candidate}")]
    EvenCandidate { candidate: u64 },

    /// A discovered prime did not extend the sequence.
    #[error("internal ordering violation: {0}")]
    Ordering(#[from] OutOfOrder),
}

impl SieveError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Store(err) => err.code(),
            Self::EvenCandidate { .. } => ErrorCode::EvenCandidate,
            Self::Ordering(_) => ErrorCode::InternalUnexpected,
        }
    }
}

/// Progress observation emitted after each checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Primes known after the checkpoint.
    pub count: usize,
    /// Largest prime known after the checkpoint.
    pub largest: u64,
}

/// Outcome of one [`Sieve::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Primes found during this run.
    pub discovered: usize,
    /// Primes known at the end of the run.
    pub total: usize,
    /// Largest prime known at the end of the run.
    pub largest: Option<u64>,
    /// Checkpoints taken during the run, not counting the final save.
    pub checkpoints: usize,
    /// First candidate a later run will test.
    pub next_candidate: u64,
    /// Whether the run ended because the stop flag was raised.
    pub stopped: bool,
}

/// Upper bound on `√i` derived from the bit length of `i`.
///
/// With `h` the index of the highest set bit, `i < 2^(h+1)`, so
/// `√i < 2^((h+1)/2) <= 2^((h+2)/2)` after integer halving. Never smaller
/// than the true square root, never more than about twice it.
#[must_use]
pub const fn sqrt_bound(i: u64) -> u64 {
    1 << ((highest_bit(i) + 2) / 2)
}

/// Whether no prime in `known` up to [`sqrt_bound`]`(candidate)` divides
/// `candidate`.
///
/// `known` must be ascending and contain every prime up to `√candidate`.
/// Returns on the first witness found.
#[must_use]
pub fn is_prime_against(candidate: u64, known: &[u64]) -> bool {
    let bound = sqrt_bound(candidate);
    known
        .iter()
        .take_while(|&&p| p <= bound)
        .all(|&p| candidate % p != 0)
}

/// Candidate to resume from after `last`, the largest known prime.
#[must_use]
pub const fn resume_candidate(last: Option<u64>) -> u64 {
    match last {
        None | Some(0..=2) => 3,
        Some(last) => last.saturating_add(2) | 1,
    }
}

/// Search engine over a [`PrimeStore`].
pub struct Sieve<I: ShardIo> {
    store: PrimeStore<I>,
    primes: PrimeSequence,
    next: u64,
    checkpoint_len: usize,
    batch_size: usize,
}

impl<I: ShardIo> Sieve<I> {
    /// Load `store` and position the search after its largest prime.
    ///
    /// A `batch_size` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::Store`] if the store cannot be loaded.
    pub fn resume(store: PrimeStore<I>, batch_size: usize) -> Result<Self, SieveError> {
        let mut primes = store.load()?;
        let checkpoint_len = primes.len();
        let next = resume_candidate(primes.last());

        if primes.is_empty() {
            primes.push(2)?;
        }

        info!(
            known = checkpoint_len,
            next_candidate = next,
            "resuming search"
        );

        Ok(Self {
            store,
            primes,
            next,
            checkpoint_len,
            batch_size: batch_size.max(1),
        })
    }

    /// Primes known so far, including ones not yet checkpointed.
    #[must_use]
    pub const fn primes(&self) -> &PrimeSequence {
        &self.primes
    }

    /// Next candidate the search will test.
    #[must_use]
    pub const fn next_candidate(&self) -> u64 {
        self.next
    }

    /// Primes covered by the last save (or by the load, before any save).
    #[must_use]
    pub const fn saved_len(&self) -> usize {
        self.checkpoint_len
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &PrimeStore<I> {
        &self.store
    }

    /// Consume the engine, returning the sequence.
    #[must_use]
    pub fn into_primes(self) -> PrimeSequence {
        self.primes
    }

    /// Save the full sequence now and move the checkpoint baseline.
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::Store`] if the save fails.
    pub fn checkpoint(&mut self) -> Result<SaveReport, SieveError> {
        let report = self.store.save(&self.primes)?;
        self.checkpoint_len = self.primes.len();
        debug!(
            appended = report.appended,
            on_disk = report.on_disk,
            "checkpoint saved"
        );
        Ok(report)
    }

    /// Search candidates below `upper_bound`, checkpointing every
    /// `batch_size` new primes and once more on the way out.
    ///
    /// `observer` sees a [`Progress`] after each batch checkpoint. `stop` is
    /// checked once per candidate; raising it ends the loop early, still
    /// followed by the final save.
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::EvenCandidate`] if the resume point is even,
    /// and [`SieveError::Store`] if a checkpoint fails. Primes found before
    /// a failed checkpoint stay in memory but are not on disk.
    pub fn run(
        &mut self,
        upper_bound: u64,
        stop: &AtomicBool,
        mut observer: impl FnMut(Progress),
    ) -> Result<RunSummary, SieveError> {
        if self.next % 2 == 0 {
            return Err(SieveError::EvenCandidate {
                candidate: self.next,
            });
        }

        let start_len = self.primes.len();
        let mut checkpoints = 0;
        let mut stopped = false;

        while self.next < upper_bound {
            if stop.load(Ordering::Relaxed) {
                stopped = true;
                break;
            }

            let candidate = self.next;
            if is_prime_against(candidate, &self.primes) {
                self.primes.push(candidate)?;

                if self.primes.len() - self.checkpoint_len >= self.batch_size {
                    self.checkpoint()?;
                    checkpoints += 1;
                    let progress = Progress {
                        count: self.primes.len(),
                        largest: candidate,
                    };
                    info!(
                        count = progress.count,
                        largest = progress.largest,
                        "checkpoint"
                    );
                    observer(progress);
                }
            }

            match candidate.checked_add(2) {
                Some(next) => self.next = next,
                None => break,
            }
        }

        self.checkpoint()?;

        Ok(RunSummary {
            discovered: self.primes.len() - start_len,
            total: self.primes.len(),
            largest: self.primes.last(),
            checkpoints,
            next_candidate: self.next,
            stopped,
        })
    }
}
