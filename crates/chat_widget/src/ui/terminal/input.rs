use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_segmentation::GraphemeCursor;

/// Rows moved by a page scroll.
const PAGE_SCROLL: u16 = 10;
/// Rows moved by a page scroll inside the analysis panel.
const PANEL_PAGE_SCROLL: u16 = 6;

/// Result of handling a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventResult {
    /// Continue processing normally
    Continue,
    /// Quit the application
    Quit,
    /// Send the current draft
    Submit,
    /// Open or close the analysis panel
    ToggleAnalysis,
    /// Scroll the transcript back by this many rows
    ScrollUp(u16),
    /// Scroll the transcript forward by this many rows
    ScrollDown(u16),
    /// Jump back to the newest message
    ScrollToLatest,
    /// Scroll the analysis panel back by this many rows
    ScrollAnalysisUp(u16),
    /// Scroll the analysis panel forward by this many rows
    ScrollAnalysisDown(u16),
    /// Escape key was pressed - main loop decides what to do
    Escape,
}

/// Single-line draft editor.
///
/// `cursor` is a byte offset into `draft` and always sits on a grapheme
/// cluster boundary.
#[derive(Debug, Default)]
pub struct InputManager {
    draft: String,
    cursor: usize,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.draft
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Mutable access for the send path, which takes the draft. Call
    /// [`InputManager::sync_cursor`] afterwards.
    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    pub fn sync_cursor(&mut self) {
        if self.cursor > self.draft.len() || !self.draft.is_char_boundary(self.cursor) {
            self.cursor = self.draft.len();
        }
    }

    /// Handle a key event. Editing keys and `Enter` are ignored unless
    /// `editable`; navigation and quit keys always work.
    pub fn handle_key_event(&mut self, key_event: KeyEvent, editable: bool) -> KeyEventResult {
        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key_event.modifiers.contains(KeyModifiers::SHIFT);
        match key_event.code {
            KeyCode::Char('c') if ctrl => KeyEventResult::Quit,
            KeyCode::Char('t') if ctrl => KeyEventResult::ToggleAnalysis,
            KeyCode::Tab => KeyEventResult::ToggleAnalysis,
            KeyCode::Esc => KeyEventResult::Escape,
            KeyCode::PageUp if shift => KeyEventResult::ScrollAnalysisUp(PANEL_PAGE_SCROLL),
            KeyCode::PageDown if shift => KeyEventResult::ScrollAnalysisDown(PANEL_PAGE_SCROLL),
            KeyCode::Up if ctrl => KeyEventResult::ScrollAnalysisUp(1),
            KeyCode::Down if ctrl => KeyEventResult::ScrollAnalysisDown(1),
            KeyCode::PageUp => KeyEventResult::ScrollUp(PAGE_SCROLL),
            KeyCode::PageDown => KeyEventResult::ScrollDown(PAGE_SCROLL),
            KeyCode::Up => KeyEventResult::ScrollUp(1),
            KeyCode::Down => KeyEventResult::ScrollDown(1),
            KeyCode::End if ctrl => KeyEventResult::ScrollToLatest,
            KeyCode::Enter if editable => KeyEventResult::Submit,
            _ if !editable => KeyEventResult::Continue,
            KeyCode::Char('u') if ctrl => {
                self.clear();
                KeyEventResult::Continue
            }
            KeyCode::Char(ch) if !ctrl => {
                self.insert_char(ch);
                KeyEventResult::Continue
            }
            KeyCode::Backspace => {
                self.backspace();
                KeyEventResult::Continue
            }
            KeyCode::Delete => {
                self.delete();
                KeyEventResult::Continue
            }
            KeyCode::Left => {
                self.move_left();
                KeyEventResult::Continue
            }
            KeyCode::Right => {
                self.move_right();
                KeyEventResult::Continue
            }
            KeyCode::Home => {
                self.cursor = 0;
                KeyEventResult::Continue
            }
            KeyCode::End => {
                self.cursor = self.draft.len();
                KeyEventResult::Continue
            }
            _ => KeyEventResult::Continue,
        }
    }

    /// Handle a terminal paste event (from bracketed paste). The draft is a
    /// single line, so line breaks become spaces.
    pub fn handle_paste(&mut self, pasted: &str, editable: bool) {
        if !editable {
            return;
        }
        let flattened = pasted
            .replace("\r\n", " ")
            .replace(['\r', '\n'], " ");
        self.insert_str(&flattened);
    }

    pub fn insert_str(&mut self, text: &str) {
        self.draft.insert_str(self.cursor, text);
        self.cursor += text.len();
    }

    fn insert_char(&mut self, ch: char) {
        self.draft.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn backspace(&mut self) {
        let start = self.prev_boundary(self.cursor);
        self.draft.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    fn delete(&mut self) {
        let end = self.next_boundary(self.cursor);
        self.draft.replace_range(self.cursor..end, "");
    }

    fn move_left(&mut self) {
        self.cursor = self.prev_boundary(self.cursor);
    }

    fn move_right(&mut self) {
        self.cursor = self.next_boundary(self.cursor);
    }

    /// Start of the grapheme cluster ending at `pos`.
    fn prev_boundary(&self, pos: usize) -> usize {
        let mut gc = GraphemeCursor::new(pos, self.draft.len(), true);
        match gc.prev_boundary(&self.draft, 0) {
            Ok(Some(boundary)) => boundary,
            Ok(None) => 0,
            Err(_) => self.draft[..pos]
                .char_indices()
                .next_back()
                .map_or(0, |(idx, _)| idx),
        }
    }

    /// End of the grapheme cluster starting at `pos`.
    fn next_boundary(&self, pos: usize) -> usize {
        let mut gc = GraphemeCursor::new(pos, self.draft.len(), true);
        match gc.next_boundary(&self.draft, 0) {
            Ok(Some(boundary)) => boundary,
            Ok(None) => self.draft.len(),
            Err(_) => self.draft[pos..]
                .chars()
                .next()
                .map_or(pos, |ch| pos + ch.len_utf8()),
        }
    }

    pub fn clear(&mut self) {
        self.draft.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn create_key_event(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(input: &mut InputManager, text: &str) {
        for ch in text.chars() {
            input.handle_key_event(create_key_event(KeyCode::Char(ch), KeyModifiers::NONE), true);
        }
    }

    #[test]
    fn test_typing_and_submit() {
        let mut input_manager = InputManager::new();
        type_text(&mut input_manager, "hi");
        assert_eq!(input_manager.text(), "hi");
        assert_eq!(input_manager.cursor(), 2);

        let result = input_manager
            .handle_key_event(create_key_event(KeyCode::Enter, KeyModifiers::NONE), true);
        assert_eq!(result, KeyEventResult::Submit);
        // The send path owns clearing.
        assert_eq!(input_manager.text(), "hi");
    }

    #[test]
    fn test_quit_signal() {
        let mut input_manager = InputManager::new();
        for editable in [true, false] {
            let result = input_manager.handle_key_event(
                create_key_event(KeyCode::Char('c'), KeyModifiers::CONTROL),
                editable,
            );
            assert_eq!(result, KeyEventResult::Quit);
        }
    }

    #[test]
    fn test_disabled_input_ignores_editing() {
        let mut input_manager = InputManager::new();
        type_text(&mut input_manager, "draft");

        let typed = input_manager
            .handle_key_event(create_key_event(KeyCode::Char('x'), KeyModifiers::NONE), false);
        let enter = input_manager
            .handle_key_event(create_key_event(KeyCode::Enter, KeyModifiers::NONE), false);
        input_manager.handle_paste("pasted", false);

        assert_eq!(typed, KeyEventResult::Continue);
        assert_eq!(enter, KeyEventResult::Continue);
        assert_eq!(input_manager.text(), "draft");
    }

    #[test]
    fn test_navigation_keys_work_while_disabled() {
        let mut input_manager = InputManager::new();
        let cases = [
            (KeyCode::Tab, KeyModifiers::NONE, KeyEventResult::ToggleAnalysis),
            (KeyCode::Char('t'), KeyModifiers::CONTROL, KeyEventResult::ToggleAnalysis),
            (KeyCode::PageUp, KeyModifiers::NONE, KeyEventResult::ScrollUp(10)),
            (KeyCode::PageDown, KeyModifiers::NONE, KeyEventResult::ScrollDown(10)),
            (KeyCode::Up, KeyModifiers::NONE, KeyEventResult::ScrollUp(1)),
            (KeyCode::Down, KeyModifiers::NONE, KeyEventResult::ScrollDown(1)),
            (KeyCode::End, KeyModifiers::CONTROL, KeyEventResult::ScrollToLatest),
            (KeyCode::Esc, KeyModifiers::NONE, KeyEventResult::Escape),
        ];
        for (code, modifiers, expected) in cases {
            let result = input_manager.handle_key_event(create_key_event(code, modifiers), false);
            assert_eq!(result, expected, "{code:?}");
        }
    }

    #[test]
    fn test_cursor_editing_is_char_aware() {
        let mut input_manager = InputManager::new();
        type_text(&mut input_manager, "héllo");

        input_manager.handle_key_event(create_key_event(KeyCode::Home, KeyModifiers::NONE), true);
        input_manager.handle_key_event(create_key_event(KeyCode::Right, KeyModifiers::NONE), true);
        input_manager.handle_key_event(create_key_event(KeyCode::Right, KeyModifiers::NONE), true);
        input_manager
            .handle_key_event(create_key_event(KeyCode::Backspace, KeyModifiers::NONE), true);
        assert_eq!(input_manager.text(), "hllo");
        assert_eq!(input_manager.cursor(), 1);

        input_manager.handle_key_event(create_key_event(KeyCode::Delete, KeyModifiers::NONE), true);
        assert_eq!(input_manager.text(), "hlo");

        input_manager.handle_key_event(create_key_event(KeyCode::End, KeyModifiers::NONE), true);
        type_text(&mut input_manager, "!");
        assert_eq!(input_manager.text(), "hlo!");
    }

    #[test]
    fn test_analysis_scroll_keys() {
        let mut input_manager = InputManager::new();
        let cases = [
            (KeyCode::PageUp, KeyModifiers::SHIFT, KeyEventResult::ScrollAnalysisUp(6)),
            (KeyCode::PageDown, KeyModifiers::SHIFT, KeyEventResult::ScrollAnalysisDown(6)),
            (KeyCode::Up, KeyModifiers::CONTROL, KeyEventResult::ScrollAnalysisUp(1)),
            (KeyCode::Down, KeyModifiers::CONTROL, KeyEventResult::ScrollAnalysisDown(1)),
            (KeyCode::PageUp, KeyModifiers::NONE, KeyEventResult::ScrollUp(10)),
            (KeyCode::Up, KeyModifiers::NONE, KeyEventResult::ScrollUp(1)),
        ];
        for (code, modifiers, expected) in cases {
            for editable in [true, false] {
                let result =
                    input_manager.handle_key_event(create_key_event(code, modifiers), editable);
                assert_eq!(result, expected, "{code:?} with {modifiers:?}");
            }
        }
    }

    #[test]
    fn test_cursor_moves_over_grapheme_clusters() {
        let mut input_manager = InputManager::new();
        // "e" + combining acute, then a ZWJ emoji sequence.
        input_manager.insert_str("ae\u{301}👩\u{200d}💻z");

        input_manager.handle_key_event(create_key_event(KeyCode::Left, KeyModifiers::NONE), true);
        input_manager.handle_key_event(create_key_event(KeyCode::Left, KeyModifiers::NONE), true);
        assert_eq!(input_manager.cursor(), "ae\u{301}".len());

        input_manager
            .handle_key_event(create_key_event(KeyCode::Backspace, KeyModifiers::NONE), true);
        assert_eq!(input_manager.text(), "a👩\u{200d}💻z");
        assert_eq!(input_manager.cursor(), 1);

        input_manager.handle_key_event(create_key_event(KeyCode::Delete, KeyModifiers::NONE), true);
        assert_eq!(input_manager.text(), "az");

        input_manager.handle_key_event(create_key_event(KeyCode::Right, KeyModifiers::NONE), true);
        assert_eq!(input_manager.cursor(), 2);
    }

    #[test]
    fn test_ctrl_u_clears() {
        let mut input_manager = InputManager::new();
        type_text(&mut input_manager, "something");
        input_manager
            .handle_key_event(create_key_event(KeyCode::Char('u'), KeyModifiers::CONTROL), true);
        assert_eq!(input_manager.text(), "");
        assert_eq!(input_manager.cursor(), 0);
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let mut input_manager = InputManager::new();
        type_text(&mut input_manager, "a ");
        input_manager.handle_paste("one\r\ntwo\nthree", true);
        assert_eq!(input_manager.text(), "a one two three");
        assert_eq!(input_manager.cursor(), input_manager.text().len());
    }

    #[test]
    fn test_sync_cursor_after_take() {
        let mut input_manager = InputManager::new();
        type_text(&mut input_manager, "sent");
        std::mem::take(input_manager.draft_mut());
        input_manager.sync_cursor();
        assert_eq!(input_manager.cursor(), 0);
        type_text(&mut input_manager, "x");
        assert_eq!(input_manager.text(), "x");
    }
}
