pub mod app;
pub mod composer;
pub mod input;
pub mod markdown;
pub mod message;
pub mod renderer;
pub mod theme;
pub mod tool_panel;
pub mod transcript;
pub mod tui;

pub use app::TerminalChatApp;
