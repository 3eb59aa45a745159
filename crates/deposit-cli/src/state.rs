//! # State File
//!
//! The CLI persists the whole repository as one pretty-printed JSON
//! document. A missing file is an empty repository. Writes go to a sibling
//! temporary file first and are renamed into place.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use deposit_core::Clock;
use deposit_engine::{
    DepositService, InMemoryRepository, LoggingNotifier, RepositorySnapshot, SweepReport,
};

use crate::CliContext;

/// Read the snapshot at `path`, or an empty one if the file does not exist.
pub fn load_snapshot(path: &Path) -> Result<RepositorySnapshot> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "state file missing, starting empty");
        return Ok(RepositorySnapshot::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid state file {}", path.display()))
}

/// Write the snapshot to `path`.
pub fn save_snapshot(path: &Path, snapshot: &RepositorySnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("failed to serialize state")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace state file {}", path.display()))?;
    Ok(())
}

/// Build a service over the state file's contents.
pub fn open_service(
    ctx: &CliContext,
    clock: Arc<dyn Clock>,
) -> Result<DepositService<InMemoryRepository>> {
    let snapshot = load_snapshot(&ctx.state_file)?;
    let repo = InMemoryRepository::from_snapshot(snapshot)
        .with_context(|| format!("corrupt state file {}", ctx.state_file.display()))?;
    Ok(DepositService::new(
        Arc::new(repo),
        clock,
        Arc::new(LoggingNotifier),
        ctx.config.clone(),
    ))
}

/// Persist a service's repository back to the state file.
pub fn persist(ctx: &CliContext, service: &DepositService<InMemoryRepository>) -> Result<()> {
    save_snapshot(&ctx.state_file, &service.repository().snapshot())
}

/// Load the state file, run one sweep over it, and write the result back.
///
/// The file is re-read on every call, so records written by other commands
/// since the previous sweep are carried into this one.
pub fn sweep_state_file(ctx: &CliContext, clock: Arc<dyn Clock>) -> Result<SweepReport> {
    let service = open_service(ctx, clock)?;
    let report = service.scheduler().run_sweep();
    persist(ctx, &service)?;
    Ok(report)
}
