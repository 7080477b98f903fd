// Terminal lifecycle: raw mode, alternate screen and bracketed paste are
// enabled together and always torn down together, including on panic.

use std::io;
use std::io::stdout;
use std::io::Stdout;
use std::panic;

use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Frame;

/// Type alias for the terminal type used in this application.
pub type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

/// Initialize the terminal (full-screen alternate buffer).
pub fn init() -> io::Result<Tui> {
    enable_raw_mode()?;
    if let Err(err) = execute!(stdout(), EnterAlternateScreen, EnableBracketedPaste) {
        let _ = disable_raw_mode();
        return Err(err);
    }

    set_panic_hook();

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(Tui { terminal })
}

/// Restore terminal state.
pub fn restore() -> io::Result<()> {
    execute!(stdout(), DisableBracketedPaste, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

fn set_panic_hook() {
    let hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        hook(panic_info);
    }));
}

pub struct Tui {
    pub terminal: Terminal,
}

impl Tui {
    /// Draw a frame to the terminal.
    pub fn draw(&mut self, draw_fn: impl FnOnce(&mut Frame)) -> io::Result<()> {
        self.terminal.draw(draw_fn)?;
        Ok(())
    }
}
