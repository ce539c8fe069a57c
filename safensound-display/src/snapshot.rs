//! JSON snapshot sink
//!
//! Writes each published state to a file. The file is replaced through a
//! rename, so readers only ever see a complete document.

use std::path::{Path, PathBuf};

use anyhow::Context;
use safensound_common::{DisplayState, StateReceiver};

use crate::next_state;

pub async fn write_snapshot(path: &Path, state: &DisplayState) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(state).context("Failed to serialize display state")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}

pub async fn run_snapshot_writer(mut receiver: StateReceiver, path: PathBuf) {
    tracing::info!("Writing display snapshots to {}", path.display());

    while let Some(state) = next_state(&mut receiver).await {
        if let Err(e) = write_snapshot(&path, &state).await {
            tracing::warn!("Snapshot for cycle {} not written: {:#}", state.cycle, e);
        }
    }
}
