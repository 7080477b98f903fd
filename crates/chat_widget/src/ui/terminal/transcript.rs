use chat_core::{Message, Sender, Transcript};
use ratatui::{
    layout::{Alignment, Rect},
    text::Line,
    widgets::{Paragraph, Widget},
    Frame,
};

use super::message::{message_lines, typing_line};
use super::theme;

pub const EMPTY_PLACEHOLDER: &str = "No messages yet. Start a conversation!";

/// Display lines of one message, valid while sender, text and width match.
#[derive(Debug)]
struct RenderedMessage {
    sender: Sender,
    text: String,
    width: u16,
    lines: Vec<Line<'static>>,
}

impl RenderedMessage {
    fn new(message: &Message, width: u16) -> Self {
        Self {
            sender: message.sender,
            text: message.text.clone(),
            width,
            lines: message_lines(message, width),
        }
    }

    fn matches(&self, message: &Message, width: u16) -> bool {
        self.width == width && self.sender == message.sender && self.text == message.text
    }
}

/// Scrollable view over the transcript.
///
/// `scroll_back` counts rows above the newest one; zero means the view
/// follows the latest message. Rendered lines are kept per message so a
/// redraw only re-renders entries whose text or width changed.
#[derive(Debug, Default)]
pub struct TranscriptView {
    scroll_back: usize,
    cache: Vec<RenderedMessage>,
    /// Blank row between messages.
    separator: Line<'static>,
    #[cfg(test)]
    renders: usize,
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_up(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_add(usize::from(rows));
    }

    pub fn scroll_down(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_sub(usize::from(rows));
    }

    pub fn follow_latest(&mut self) {
        self.scroll_back = 0;
    }

    pub fn is_following(&self) -> bool {
        self.scroll_back == 0
    }

    #[cfg(test)]
    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    /// Number of message renders since the view was created.
    #[cfg(test)]
    pub fn renders(&self) -> usize {
        self.renders
    }

    fn refresh_cache(&mut self, transcript: &Transcript, width: u16) {
        self.cache.truncate(transcript.len());
        for (index, message) in transcript.iter().enumerate() {
            match self.cache.get_mut(index) {
                Some(cached) if cached.matches(message, width) => continue,
                Some(cached) => *cached = RenderedMessage::new(message, width),
                None => self.cache.push(RenderedMessage::new(message, width)),
            }
            #[cfg(test)]
            {
                self.renders += 1;
            }
        }
    }

    /// All display lines for `transcript` at `width`, one blank row between
    /// messages. Only a streaming last message gets the typing indicator.
    #[cfg(test)]
    pub fn build_lines(
        &mut self,
        transcript: &Transcript,
        width: u16,
        typing_phase: usize,
    ) -> Vec<Line<'static>> {
        let (rows, typing) = self.rows(transcript, width, typing_phase);
        rows.into_iter().chain(typing.as_ref()).cloned().collect()
    }

    /// Borrowed rows from the cache plus the typing row, if any.
    fn rows(
        &mut self,
        transcript: &Transcript,
        width: u16,
        typing_phase: usize,
    ) -> (Vec<&Line<'static>>, Option<Line<'static>>) {
        self.refresh_cache(transcript, width);
        let typing = transcript
            .streaming_tail()
            .map(|_| typing_line(typing_phase));

        let mut rows = Vec::new();
        for (index, rendered) in self.cache.iter().enumerate() {
            if index > 0 {
                rows.push(&self.separator);
            }
            rows.extend(rendered.lines.iter());
        }
        (rows, typing)
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        transcript: &Transcript,
        typing_phase: usize,
    ) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        if transcript.is_empty() {
            self.scroll_back = 0;
            self.cache.clear();
            let y = area.y + area.height / 2;
            Paragraph::new(Line::styled(EMPTY_PLACEHOLDER, theme::dim()))
                .alignment(Alignment::Center)
                .render(
                    Rect {
                        y,
                        height: 1,
                        ..area
                    },
                    f.buffer_mut(),
                );
            return;
        }

        let viewport = usize::from(area.height);
        let mut scroll_back = self.scroll_back;
        let (rows, typing) = self.rows(transcript, area.width, typing_phase);
        let total = rows.len() + usize::from(typing.is_some());
        scroll_back = scroll_back.min(total.saturating_sub(viewport));

        let end = total - scroll_back;
        let start = end.saturating_sub(viewport);
        let visible: Vec<Line<'static>> = rows
            .into_iter()
            .chain(typing.as_ref())
            .skip(start)
            .take(end - start)
            .cloned()
            .collect();
        self.scroll_back = scroll_back;
        Paragraph::new(visible).render(area, f.buffer_mut());
    }
}
