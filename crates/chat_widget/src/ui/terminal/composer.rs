use ratatui::{
    layout::{Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use super::input::InputManager;
use super::theme;

pub const PLACEHOLDER: &str = "Type your message...";
pub const DISCONNECTED_NOTICE: &str = "Disconnected from server. Please check your connection.";

const SEND_LABEL: &str = " Send ";

pub struct Composer;

impl Composer {
    /// Bordered input row plus one footer row.
    pub const HEIGHT: u16 = 4;

    /// Layout:
    ///   Rows 0..3: bordered box with the draft and the send label
    ///   Row 3:     footer (key hints, or the disconnected notice)
    pub fn render(f: &mut Frame, area: Rect, input: &InputManager, connected: bool) {
        if area.height < Self::HEIGHT || area.width < 8 {
            return;
        }

        let box_rect = Rect {
            height: 3,
            ..area
        };
        let border_style = if connected {
            Style::default().fg(Color::Gray)
        } else {
            theme::dim()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style);
        let inner = block.inner(box_rect);
        block.render(box_rect, f.buffer_mut());

        let label_width = SEND_LABEL.width() as u16;
        let text_width = inner.width.saturating_sub(label_width + 1);
        let text_rect = Rect {
            width: text_width,
            ..inner
        };
        let label_rect = Rect {
            x: inner.x + inner.width.saturating_sub(label_width),
            width: label_width.min(inner.width),
            ..inner
        };

        let draft = input.text();
        let (visible, cursor_col) = if draft.is_empty() {
            (Line::styled(PLACEHOLDER, theme::dim()), 0)
        } else {
            let (slice, col) = visible_slice(draft, input.cursor(), text_width);
            (Line::raw(slice.to_string()), col)
        };
        Paragraph::new(visible).render(text_rect, f.buffer_mut());

        let can_send = connected && !draft.trim().is_empty();
        let label_style = if can_send {
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD)
        } else {
            theme::dim()
        };
        Span::styled(SEND_LABEL, label_style).render(label_rect, f.buffer_mut());

        let footer_rect = Rect {
            y: area.y + 3,
            height: 1,
            ..area
        };
        footer_line(connected).render(footer_rect, f.buffer_mut());

        if connected {
            f.set_cursor_position(Position::new(text_rect.x + cursor_col, text_rect.y));
        }
    }
}

fn footer_line(connected: bool) -> Line<'static> {
    if !connected {
        return Line::styled(format!(" {DISCONNECTED_NOTICE}"), theme::error());
    }
    let action_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::DIM);
    let mapping_style = Style::default().fg(Color::Gray).add_modifier(Modifier::DIM);
    Line::from(vec![
        Span::styled(" Enter", action_style),
        Span::styled(" send  ", mapping_style),
        Span::styled("Tab", action_style),
        Span::styled(" analysis  ", mapping_style),
        Span::styled("PgUp/PgDn", action_style),
        Span::styled(" scroll  ", mapping_style),
        Span::styled("Ctrl+C", action_style),
        Span::styled(" quit", mapping_style),
    ])
}

/// The part of `text` that fits in `width` columns while keeping the cursor
/// (a byte offset) visible, and the cursor's column within that part.
fn visible_slice(text: &str, cursor: usize, width: u16) -> (&str, u16) {
    let width = usize::from(width.max(1));
    let before = &text[..cursor];

    // Leave one column for the cursor itself.
    let mut start = 0;
    let mut cols_before = before.width();
    if cols_before >= width {
        for (idx, grapheme) in before.grapheme_indices(true) {
            if cols_before < width {
                break;
            }
            cols_before -= grapheme.width();
            start = idx + grapheme.len();
        }
    }

    let mut end = start;
    let mut used = 0;
    for (idx, grapheme) in text[start..].grapheme_indices(true) {
        let grapheme_width = grapheme.width();
        if used + grapheme_width > width {
            break;
        }
        used += grapheme_width;
        end = start + idx + grapheme.len();
    }

    (&text[start..end], cols_before as u16)
}
