use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::cli::Cli;

const LOG_DIR_NAME: &str = "chat-widget";
const LOG_FILE_NAME: &str = "chat-widget.log";

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub endpoint: String,
    pub log_file: PathBuf,
    pub analysis_open: bool,
}

impl WidgetConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let endpoint = normalize_endpoint(&cli.url)?;
        let log_file = match cli.log_file {
            Some(path) => path,
            None => default_log_file()?,
        };

        Ok(Self {
            endpoint,
            log_file,
            analysis_open: !cli.collapse_analysis,
        })
    }
}

/// Turn user input into a `ws://` or `wss://` URL.
///
/// Bare `host[:port]/path` gets `ws://`, and `http(s)://` maps to `ws(s)://`.
pub fn normalize_endpoint(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("endpoint URL is empty");
    }

    let normalized = if raw.starts_with("ws://") || raw.starts_with("wss://") {
        raw.to_string()
    } else if let Some(rest) = raw.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = raw.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if raw.contains("://") {
        bail!("unsupported endpoint scheme in `{raw}` (expected ws:// or wss://)");
    } else {
        format!("ws://{raw}")
    };

    let host = normalized
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or_default();
    if host.is_empty() || host.starts_with('/') {
        bail!("endpoint `{raw}` has no host");
    }

    Ok(normalized)
}

fn default_log_file() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .context("could not determine a data directory for the log file")?;
    Ok(log_file_in(&base))
}

fn log_file_in(base: &Path) -> PathBuf {
    base.join(LOG_DIR_NAME).join(LOG_FILE_NAME)
}
