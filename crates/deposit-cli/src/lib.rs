//! # deposit-cli: Deposit Escrow CLI
//!
//! Provides the `deposit` command-line interface over a JSON state file
//! holding a [`RepositorySnapshot`](deposit_engine::RepositorySnapshot).
//!
//! ## Subcommands
//!
//! - `deposit quote`: Risk-adjusted deposit amount with its adjustments.
//! - `deposit breakdown`: Released / refunded / in-escrow split of an account.
//! - `deposit sweep`: One deadline sweep, persisted back to the state file.
//! - `deposit run`: Sweep on a timer until Ctrl-C.
//!
//! ```bash
//! deposit quote --rent 2000 --employment corporate --credit-score 780
//! deposit --state deposits.json breakdown 6f1c…
//! deposit --config engine.yaml --state deposits.json run --interval-secs 60
//! ```

pub mod breakdown;
pub mod quote;
pub mod run;
pub mod state;
pub mod sweep;

use std::path::PathBuf;

use anyhow::{Context, Result};
use deposit_engine::EngineConfig;

/// Exit code when a consistency violation was detected.
pub const EXIT_CONSISTENCY: u8 = 2;

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Engine configuration.
    pub config: EngineConfig,
    /// JSON state file.
    pub state_file: PathBuf,
}

impl CliContext {
    /// Load the config file if given, otherwise use defaults.
    pub fn load(config: Option<&std::path::Path>, state_file: PathBuf) -> Result<Self> {
        let config = match config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        Ok(Self { config, state_file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn context_defaults_without_config() {
        let ctx = CliContext::load(None, PathBuf::from("state.json")).unwrap();
        assert_eq!(ctx.config, EngineConfig::default());
    }

    #[test]
    fn context_reads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sweep_interval_secs: 5\ncurrency: GBP").unwrap();
        let ctx = CliContext::load(Some(file.path()), PathBuf::from("state.json")).unwrap();
        assert_eq!(ctx.config.sweep_interval_secs, 5);
        assert_eq!(ctx.config.currency, "GBP");
    }

    #[test]
    fn context_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sweep_interval_secs: 0").unwrap();
        let err = CliContext::load(Some(file.path()), PathBuf::from("state.json")).unwrap_err();
        assert!(format!("{err:#}").contains("sweep_interval_secs"));
    }
}
