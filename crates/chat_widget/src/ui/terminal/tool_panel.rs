use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use super::markdown::render_markdown_lines;
use super::theme;

/// Content rows shown when the panel is open.
pub const MAX_PANEL_ROWS: u16 = 12;

/// Rendered body of the tool buffer. The buffer only grows, so its length
/// and the width identify the rendering.
#[derive(Debug)]
struct RenderedBody {
    content_len: usize,
    width: u16,
    lines: Vec<Line<'static>>,
}

/// Scroll position and rendered body of the analysis panel, kept between
/// frames.
///
/// `scroll_back` counts rows above the newest one, as in the transcript.
#[derive(Debug, Default)]
pub struct AnalysisPanelState {
    scroll_back: usize,
    body: Option<RenderedBody>,
    #[cfg(test)]
    renders: usize,
}

impl AnalysisPanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_up(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_add(usize::from(rows));
    }

    pub fn scroll_down(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_sub(usize::from(rows));
    }

    #[cfg(test)]
    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    fn body_lines(&mut self, content: &str, width: u16) -> &[Line<'static>] {
        // Borders take one column each side.
        let width = width.saturating_sub(2).max(1);
        let stale = !matches!(
            &self.body,
            Some(body) if body.content_len == content.len() && body.width == width
        );
        if stale {
            #[cfg(test)]
            {
                self.renders += 1;
            }
            self.body = Some(RenderedBody {
                content_len: content.len(),
                width,
                lines: render_markdown_lines(content, width),
            });
        }
        match &self.body {
            Some(body) => &body.lines,
            None => &[],
        }
    }
}

/// Collapsible box showing the assistant's tool output.
///
/// Rendered only while the tool buffer has content. When closed only the
/// title row is drawn.
pub struct AnalysisPanel<'a> {
    content: &'a str,
    open: bool,
}

impl<'a> AnalysisPanel<'a> {
    pub fn new(content: &'a str, open: bool) -> Self {
        Self { content, open }
    }

    pub fn is_visible(&self) -> bool {
        !self.content.is_empty()
    }

    /// Rows needed at `width`, never more than `max`.
    pub fn height(&self, state: &mut AnalysisPanelState, width: u16, max: u16) -> u16 {
        if !self.is_visible() {
            return 0;
        }
        if !self.open {
            return 1.min(max);
        }
        let rows = state
            .body_lines(self.content, width)
            .len()
            .min(usize::from(MAX_PANEL_ROWS)) as u16;
        // Title row plus top and bottom border.
        (rows.max(1) + 3).min(max)
    }

    fn title(&self) -> Line<'static> {
        let chevron = if self.open { "▾" } else { "▸" };
        let hint = if self.open {
            " (Ctrl+T, Shift+PgUp/PgDn)"
        } else {
            " (Ctrl+T)"
        };
        Line::from(vec![
            Span::styled(format!("{chevron} AI analysis"), theme::analysis_title()),
            Span::styled(hint, theme::dim()),
        ])
    }
}

impl StatefulWidget for AnalysisPanel<'_> {
    type State = AnalysisPanelState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        if area.height == 0 || !self.is_visible() {
            return;
        }

        let title_rect = Rect { height: 1, ..area };
        self.title().render(title_rect, buf);

        if !self.open || area.height < 3 {
            return;
        }

        let box_rect = Rect {
            y: area.y + 1,
            height: area.height - 1,
            ..area
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::analysis_border());
        let inner = block.inner(box_rect);
        block.render(box_rect, buf);

        // Newest output stays in view unless the user scrolled back.
        let viewport = usize::from(inner.height);
        let mut scroll_back = state.scroll_back;
        let lines = state.body_lines(self.content, area.width);
        scroll_back = scroll_back.min(lines.len().saturating_sub(viewport));
        let end = lines.len() - scroll_back;
        let start = end.saturating_sub(viewport);
        let visible = lines[start..end].to_vec();
        state.scroll_back = scroll_back;
        Paragraph::new(visible).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_rows(
        panel: AnalysisPanel<'_>,
        state: &mut AnalysisPanelState,
        width: u16,
        height: u16,
    ) -> Vec<String> {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        panel.render(area, &mut buf, state);
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buf[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect()
    }

    fn numbered_lines(count: usize) -> String {
        (0..count).map(|i| format!("line {i}\n\n")).collect()
    }

    #[test]
    fn hidden_without_content() {
        let panel = AnalysisPanel::new("", true);
        assert!(!panel.is_visible());
        assert_eq!(panel.height(&mut AnalysisPanelState::new(), 40, 20), 0);
    }

    #[test]
    fn closed_panel_is_one_row() {
        let mut state = AnalysisPanelState::new();
        let panel = AnalysisPanel::new("searching", false);
        assert_eq!(panel.height(&mut state, 40, 20), 1);
        let rows = render_rows(AnalysisPanel::new("searching", false), &mut state, 40, 1);
        assert!(rows[0].starts_with("▸ AI analysis"), "{rows:?}");
    }

    #[test]
    fn open_panel_shows_content() {
        let mut state = AnalysisPanelState::new();
        let panel = AnalysisPanel::new("step **one**", true);
        assert_eq!(panel.height(&mut state, 40, 20), 4);

        let rows = render_rows(AnalysisPanel::new("step **one**", true), &mut state, 40, 4);
        assert!(rows[0].starts_with("▾ AI analysis"));
        assert!(rows[2].contains("step one"), "{rows:?}");
    }

    #[test]
    fn open_panel_is_capped_and_shows_newest() {
        let content = numbered_lines(30);
        let mut state = AnalysisPanelState::new();
        let panel = AnalysisPanel::new(&content, true);
        assert_eq!(panel.height(&mut state, 40, 100), MAX_PANEL_ROWS + 3);
        assert_eq!(panel.height(&mut state, 40, 6), 6);

        let rows = render_rows(
            AnalysisPanel::new(&content, true),
            &mut state,
            40,
            MAX_PANEL_ROWS + 3,
        );
        let body = rows.join("\n");
        assert!(body.contains("line 29"), "{body}");
        assert!(!body.contains("line 0 "), "{body}");
    }

    #[test]
    fn height_is_capped_for_very_long_output() {
        let content = "x\n\n".repeat(5_000);
        let mut state = AnalysisPanelState::new();
        let panel = AnalysisPanel::new(&content, true);
        assert_eq!(panel.height(&mut state, 20, 100), MAX_PANEL_ROWS + 3);
    }

    #[test]
    fn scrolls_back_through_older_output() {
        let content = numbered_lines(30);
        let mut state = AnalysisPanelState::new();
        let height = MAX_PANEL_ROWS + 3;

        state.scroll_up(1000);
        let rows = render_rows(AnalysisPanel::new(&content, true), &mut state, 40, height);
        let body = rows.join("\n");
        assert!(body.contains("line 0 "), "{body}");
        assert!(!body.contains("line 29"), "{body}");

        let total = state.body_lines(&content, 40).len();
        let viewport = usize::from(MAX_PANEL_ROWS);
        assert_eq!(state.scroll_back(), total - viewport);

        state.scroll_down(1000);
        let rows = render_rows(AnalysisPanel::new(&content, true), &mut state, 40, height);
        assert!(rows.join("\n").contains("line 29"));
        assert_eq!(state.scroll_back(), 0);
    }

    #[test]
    fn body_is_rendered_once_per_content_change() {
        let mut content = numbered_lines(3);
        let mut state = AnalysisPanelState::new();

        for _ in 0..3 {
            let panel = AnalysisPanel::new(&content, true);
            let height = panel.height(&mut state, 40, 20);
            render_rows(panel, &mut state, 40, height);
        }
        assert_eq!(state.renders, 1);

        content.push_str("more output\n");
        let panel = AnalysisPanel::new(&content, true);
        panel.height(&mut state, 40, 20);
        assert_eq!(state.renders, 2);
    }
}
