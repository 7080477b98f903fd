use chat_core::ConnectionState;
use ratatui::style::{Color, Modifier, Style};

pub fn title() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

pub fn dim() -> Style {
    Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::DIM)
}

pub fn user_label() -> Style {
    Style::default()
        .fg(Color::Blue)
        .add_modifier(Modifier::BOLD)
}

pub fn user_bubble() -> Style {
    Style::default().fg(Color::White).bg(Color::Blue)
}

pub fn bot_label() -> Style {
    Style::default()
        .fg(Color::Green)
        .add_modifier(Modifier::BOLD)
}

pub fn bot_gutter() -> Style {
    Style::default().fg(Color::DarkGray)
}

pub fn typing_dot() -> Style {
    Style::default().fg(Color::Gray)
}

pub fn analysis_title() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

pub fn analysis_border() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::DIM)
}

pub fn error() -> Style {
    Style::default().fg(Color::Red)
}

pub fn status_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Open => Color::Green,
        ConnectionState::Closed => Color::Red,
    }
}
