use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_ENDPOINT: &str = "wss://chat.dpu.openscholar.in/ws/chat/room1";

#[derive(Parser, Debug)]
#[command(name = "chat-widget")]
#[command(version, about = "Terminal chat client for a streaming assistant service")]
pub struct Cli {
    /// WebSocket endpoint of the assistant service
    #[arg(long, env = "CHAT_WIDGET_URL", default_value = DEFAULT_ENDPOINT)]
    pub url: String,

    /// Operator log file (defaults to <data dir>/chat-widget/chat-widget.log)
    #[arg(long, env = "CHAT_WIDGET_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Start with the AI analysis panel collapsed
    #[arg(long)]
    pub collapse_analysis: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "chat-widget",
            "--url",
            "ws://localhost:9000/ws",
            "--log-file",
            "/tmp/widget.log",
            "--collapse-analysis",
        ])
        .unwrap();
        assert_eq!(cli.url, "ws://localhost:9000/ws");
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/widget.log")));
        assert!(cli.collapse_analysis);
    }
}
