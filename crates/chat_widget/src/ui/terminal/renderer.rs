use std::time::Instant;

use chat_core::{ChatReducer, ConnectionState};
use ratatui::{
    prelude::*,
    widgets::{Paragraph, Wrap},
};

use super::composer::Composer;
use super::input::InputManager;
use super::theme;
use super::tool_panel::{AnalysisPanel, AnalysisPanelState};
use super::transcript::TranscriptView;

pub const TITLE: &str = "AI Chat Assistant";

const SPINNER_CHARS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const SPINNER_FRAME_MS: u128 = 100;
const TYPING_FRAME_MS: u128 = 300;
/// The analysis panel never takes more than this share of the screen.
const ANALYSIS_MAX_PERCENT: u16 = 40;

/// Handles the terminal display. Does NOT own a terminal; the `Tui` layer
/// owns it and calls [`TerminalRenderer::paint`] once per frame.
pub struct TerminalRenderer {
    pub transcript_view: TranscriptView,
    pub analysis_state: AnalysisPanelState,
    analysis_open: bool,
    info_message: Option<String>,
    animation_origin: Instant,
}

impl TerminalRenderer {
    pub fn new(analysis_open: bool) -> Self {
        Self {
            transcript_view: TranscriptView::new(),
            analysis_state: AnalysisPanelState::new(),
            analysis_open,
            info_message: None,
            animation_origin: Instant::now(),
        }
    }

    /// Layout, top to bottom: header, analysis panel, transcript, info line,
    /// composer.
    pub fn paint(
        &mut self,
        f: &mut Frame,
        reducer: &ChatReducer,
        state: ConnectionState,
        input: &InputManager,
    ) {
        let area = f.area();
        if area.height < Composer::HEIGHT + 2 || area.width < 10 {
            return;
        }

        let panel = AnalysisPanel::new(reducer.tool_buffer().as_str(), self.analysis_open);
        let panel_max = area.height * ANALYSIS_MAX_PERCENT / 100;
        let panel_height = panel.height(&mut self.analysis_state, area.width, panel_max);
        let info_height = u16::from(self.info_message.is_some());

        let [header_area, panel_area, transcript_area, info_area, composer_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(panel_height),
                Constraint::Min(0),
                Constraint::Length(info_height),
                Constraint::Length(Composer::HEIGHT),
            ])
            .areas(area);

        f.render_widget(self.header_line(state), header_area);
        f.render_stateful_widget(panel, panel_area, &mut self.analysis_state);
        self.transcript_view
            .render(f, transcript_area, reducer.transcript(), self.typing_phase());
        if let Some(message) = &self.info_message {
            Self::render_info_message(f, info_area, message);
        }
        Composer::render(f, composer_area, input, state.is_open());
    }

    fn header_line(&self, state: ConnectionState) -> Line<'static> {
        let color = theme::status_color(state);
        let (marker, label) = match state {
            ConnectionState::Connecting => (self.spinner_char().to_string(), "Connecting…"),
            ConnectionState::Open => ("●".to_string(), "Connected"),
            ConnectionState::Closed => ("●".to_string(), "Disconnected"),
        };
        Line::from(vec![
            Span::styled(format!(" {TITLE}"), theme::title()),
            Span::raw("  "),
            Span::styled(marker, Style::default().fg(color)),
            Span::raw(" "),
            Span::styled(label, Style::default().fg(color)),
        ])
    }

    fn render_info_message(f: &mut Frame, area: Rect, message: &str) {
        if area.height == 0 {
            return;
        }
        let paragraph = Paragraph::new(format!(" {message}  (Esc to dismiss)"))
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn spinner_char(&self) -> char {
        let elapsed_ms = self.animation_origin.elapsed().as_millis();
        let index = (elapsed_ms / SPINNER_FRAME_MS) % SPINNER_CHARS.len() as u128;
        SPINNER_CHARS[index as usize]
    }

    fn typing_phase(&self) -> usize {
        let elapsed_ms = self.animation_origin.elapsed().as_millis();
        ((elapsed_ms / TYPING_FRAME_MS) % 3) as usize
    }

    /// Returns true when the UI has time-varying content that requires
    /// periodic redraws even without external events (connecting spinner,
    /// typing indicator).
    pub fn needs_animation_timer(&self, reducer: &ChatReducer, state: ConnectionState) -> bool {
        state.is_connecting() || reducer.transcript().streaming_tail().is_some()
    }

    pub fn toggle_analysis(&mut self) {
        self.analysis_open = !self.analysis_open;
    }

    pub fn analysis_open(&self) -> bool {
        self.analysis_open
    }

    /// Set an info message to display
    pub fn set_info(&mut self, info_message: impl Into<String>) {
        self.info_message = Some(info_message.into());
    }

    /// Clear the current info message
    pub fn clear_info(&mut self) {
        self.info_message = None;
    }

    pub fn has_info(&self) -> bool {
        self.info_message.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::{ConnectionError, FrameSink, OutboundFrame};
    use ratatui::backend::TestBackend;

    use crate::ui::terminal::composer::DISCONNECTED_NOTICE;
    use crate::ui::terminal::transcript::EMPTY_PLACEHOLDER;

    struct NullSink;

    impl FrameSink for NullSink {
        fn send_frame(&self, _frame: &OutboundFrame) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    /// Test harness that pairs a TerminalRenderer with a test terminal.
    struct TestHarness {
        renderer: TerminalRenderer,
        terminal: Terminal<TestBackend>,
        reducer: ChatReducer,
        input: InputManager,
    }

    impl TestHarness {
        fn new(width: u16, height: u16) -> Self {
            Self {
                renderer: TerminalRenderer::new(true),
                terminal: Terminal::new(TestBackend::new(width, height)).unwrap(),
                reducer: ChatReducer::new(),
                input: InputManager::new(),
            }
        }

        /// Render and return the screen as one string per row.
        fn render(&mut self, state: ConnectionState) -> Vec<String> {
            let Self {
                renderer,
                terminal,
                reducer,
                input,
            } = self;
            terminal
                .draw(|f| renderer.paint(f, reducer, state, input))
                .unwrap();
            let buffer = terminal.backend().buffer();
            (0..buffer.area.height)
                .map(|y| {
                    (0..buffer.area.width)
                        .map(|x| buffer[(x, y)].symbol())
                        .collect::<String>()
                })
                .collect()
        }

        fn frame(&mut self, json: &str) {
            self.reducer.apply_frame(json).unwrap();
        }
    }

    fn contains(rows: &[String], needle: &str) -> bool {
        rows.iter().any(|row| row.contains(needle))
    }

    #[test]
    fn test_initial_screen() {
        let mut harness = TestHarness::new(60, 16);
        let rows = harness.render(ConnectionState::Open);

        assert!(rows[0].contains(TITLE));
        assert!(rows[0].contains("● Connected"));
        assert!(contains(&rows, EMPTY_PLACEHOLDER));
        assert!(contains(&rows, "Type your message..."));
        assert!(!contains(&rows, "AI analysis"));
    }

    #[test]
    fn test_header_status_follows_connection() {
        let mut harness = TestHarness::new(60, 16);

        let rows = harness.render(ConnectionState::Connecting);
        assert!(rows[0].contains("Connecting…"));

        let rows = harness.render(ConnectionState::Closed);
        assert!(rows[0].contains("● Disconnected"));
        assert!(contains(&rows, DISCONNECTED_NOTICE));
    }

    #[test]
    fn test_conversation_renders_both_senders() {
        let mut harness = TestHarness::new(60, 20);
        let mut draft = "What is 2+2?".to_string();
        harness.reducer.send_message(&mut draft, &NullSink);
        harness.frame(r#"{"type":"text","response":"It is **4**."}"#);

        let rows = harness.render(ConnectionState::Open);
        assert!(contains(&rows, "You"));
        assert!(contains(&rows, "What is 2+2?"));
        assert!(contains(&rows, "Assistant"));
        assert!(contains(&rows, "It is 4."));
        assert!(!contains(&rows, EMPTY_PLACEHOLDER));
    }

    #[test]
    fn test_analysis_panel_toggles() {
        let mut harness = TestHarness::new(60, 24);
        harness.frame(r#"{"type":"tool","response":"Searching papers\\n"}"#);

        let rows = harness.render(ConnectionState::Open);
        assert!(contains(&rows, "▾ AI analysis"));
        assert!(contains(&rows, "Searching papers"));

        harness.renderer.toggle_analysis();
        assert!(!harness.renderer.analysis_open());
        let rows = harness.render(ConnectionState::Open);
        assert!(contains(&rows, "▸ AI analysis"));
        assert!(!contains(&rows, "Searching papers"));
    }

    #[test]
    fn test_analysis_panel_scrolls_independently() {
        let mut harness = TestHarness::new(60, 40);
        let steps: String = (0..20).map(|i| format!("step {i}\\n\\n")).collect();
        harness.frame(&format!(r#"{{"type":"tool","response":"{steps}"}}"#));
        harness.frame(r#"{"type":"text","response":"final answer"}"#);

        let rows = harness.render(ConnectionState::Open);
        assert!(contains(&rows, "step 19"));
        assert!(!contains(&rows, "step 0 "));

        harness.renderer.analysis_state.scroll_up(100);
        let rows = harness.render(ConnectionState::Open);
        assert!(contains(&rows, "step 0 "), "{rows:?}");
        assert!(!contains(&rows, "step 19"));
        assert!(contains(&rows, "final answer"));
        assert!(harness.renderer.transcript_view.is_following());
    }

    #[test]
    fn test_info_message_lifecycle() {
        let mut harness = TestHarness::new(60, 16);
        harness.renderer.set_info("Message was not delivered");
        assert!(harness.renderer.has_info());
        let rows = harness.render(ConnectionState::Open);
        assert!(contains(&rows, "Message was not delivered"));

        harness.renderer.clear_info();
        let rows = harness.render(ConnectionState::Open);
        assert!(!contains(&rows, "Message was not delivered"));
    }

    #[test]
    fn test_animation_timer() {
        let mut harness = TestHarness::new(60, 16);
        assert!(harness
            .renderer
            .needs_animation_timer(&harness.reducer, ConnectionState::Connecting));
        assert!(!harness
            .renderer
            .needs_animation_timer(&harness.reducer, ConnectionState::Open));

        harness.frame(r#"{"type":"text","response":"streaming"}"#);
        assert!(harness
            .renderer
            .needs_animation_timer(&harness.reducer, ConnectionState::Open));
    }

    #[test]
    fn test_tiny_terminal_does_not_panic() {
        let mut harness = TestHarness::new(5, 3);
        harness.frame(r#"{"type":"tool","response":"x"}"#);
        harness.render(ConnectionState::Open);
    }
}
