use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Send all tracing output to `path`. The terminal belongs to the UI, so the
/// log file is the operator's only view of dropped frames and connection
/// failures.
pub fn init(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install log subscriber: {err}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_to_nested_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("widget.log");

        init(&path).unwrap();
        tracing::warn!("discarding inbound frame");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("discarding inbound frame"), "{contents}");
    }
}
