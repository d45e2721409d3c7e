pub mod run;
pub mod status;
pub mod verify;

use anyhow::Result;
use clap::Args;
use primes_core::config::{self, Overrides, SieveConfig};
use std::path::{Path, PathBuf};

use crate::output::{self as out, OutputMode};

/// Store selection shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct StoreArgs {
    /// Store directory (default: `store_dir` from `primes.toml`, else `./primes`).
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,
}

impl StoreArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            store_dir: self.store.clone(),
            ..Overrides::default()
        }
    }

    /// Resolve config for read-only commands.
    pub fn resolve(&self, output: OutputMode, project_root: &Path) -> Result<SieveConfig> {
        resolve(output, project_root, self.overrides())
    }
}

/// Resolve config, reporting failures with their error code.
pub fn resolve(output: OutputMode, project_root: &Path, overrides: Overrides) -> Result<SieveConfig> {
    config::resolve_config(project_root, overrides)
        .map_err(|err| out::reported_code(output, &format!("{err:#}"), config::error_code(&err)))
}
