//! primes-core library.
//!
//! Resumable trial-division prime search. [`sieve::Sieve`] extends an
//! in-memory [`sequence::PrimeSequence`] and checkpoints it through
//! [`shard::PrimeStore`], which keeps one append-only file per byte width.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums in library modules, `anyhow::Result` at
//!   the config and binary edges.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod codec;
pub mod config;
pub mod error;
pub mod io;
pub mod lock;
pub mod sequence;
pub mod shard;
pub mod sieve;

pub use sequence::PrimeSequence;
pub use shard::{PrimeStore, StoreError};
pub use sieve::{Sieve, SieveError};
