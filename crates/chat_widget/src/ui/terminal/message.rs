use chat_core::{Message, Sender};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use super::markdown::render_markdown_lines;
use super::theme;

/// Bubbles take at most this share of the transcript width.
const BUBBLE_WIDTH_PERCENT: u32 = 80;
const MIN_BUBBLE_WIDTH: u16 = 12;
/// Columns taken by the bot gutter ("│ ").
const BOT_GUTTER: u16 = 2;
/// Horizontal padding inside a user bubble, per side.
const USER_PADDING: u16 = 1;

pub fn bubble_width(width: u16) -> u16 {
    let share = (u32::from(width) * BUBBLE_WIDTH_PERCENT / 100) as u16;
    share.max(MIN_BUBBLE_WIDTH).min(width)
}

/// Render one transcript entry as display lines for a transcript `width`
/// columns wide. The result depends only on the sender, text and width.
pub fn message_lines(message: &Message, width: u16) -> Vec<Line<'static>> {
    match message.sender {
        Sender::User => user_lines(&message.text, width),
        Sender::Bot => bot_lines(&message.text, width),
    }
}

/// User text is shown exactly as typed, never interpreted as markdown.
fn user_lines(text: &str, width: u16) -> Vec<Line<'static>> {
    let inner = bubble_width(width).saturating_sub(USER_PADDING * 2).max(1) as usize;
    let options = textwrap::Options::new(inner).wrap_algorithm(textwrap::WrapAlgorithm::FirstFit);

    let rows: Vec<String> = text
        .split('\n')
        .flat_map(|logical| {
            if logical.is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(logical, &options)
                    .into_iter()
                    .map(|row| row.into_owned())
                    .collect()
            }
        })
        .collect();
    let row_width = rows.iter().map(|row| row.width()).max().unwrap_or(0);

    let mut lines = vec![Line::styled("You", theme::user_label()).right_aligned()];
    let padding = " ".repeat(USER_PADDING as usize);
    for row in rows {
        let fill = " ".repeat(row_width.saturating_sub(row.width()));
        lines.push(
            Line::from(Span::styled(
                format!("{padding}{row}{fill}{padding}"),
                theme::user_bubble(),
            ))
            .right_aligned(),
        );
    }
    lines
}

fn gutter() -> Span<'static> {
    Span::styled("│ ", theme::bot_gutter())
}

fn bot_lines(text: &str, width: u16) -> Vec<Line<'static>> {
    let inner = bubble_width(width).saturating_sub(BOT_GUTTER);

    let mut lines = vec![Line::from(vec![
        Span::styled("◆ ", theme::bot_label()),
        Span::styled("Assistant", theme::bot_label()),
    ])];

    for rendered in render_markdown_lines(text, inner) {
        let mut spans = Vec::with_capacity(rendered.spans.len() + 1);
        spans.push(gutter());
        spans.extend(rendered.spans);
        lines.push(Line::from(spans).style(rendered.style));
    }
    lines
}

/// Typing indicator row drawn under a streaming bot message, behind the
/// same gutter as its text.
pub fn typing_line(phase: usize) -> Line<'static> {
    let mut indicator = typing_indicator(phase);
    indicator.spans.insert(0, gutter());
    indicator
}

/// Three dots, one highlighted per animation phase.
pub fn typing_indicator(phase: usize) -> Line<'static> {
    let active = phase % 3;
    let spans = (0..3)
        .map(|dot| {
            let style = if dot == active {
                theme::typing_dot()
            } else {
                theme::dim()
            };
            Span::styled(if dot < 2 { "● " } else { "●" }, style)
        })
        .collect::<Vec<_>>();
    Line::from(spans)
}
