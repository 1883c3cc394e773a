//! Terminal output for the live view.
//!
//! Owns the alternate screen for the lifetime of the monitor and redraws the
//! whole frame in place on every tick.

use std::io::{self, Stdout, Write};

use crossterm::cursor::{Hide, MoveTo, MoveToNextLine, Show};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use crate::monitor::Screen;

/// Alternate-screen [`Screen`] on stdout.
///
/// The normal screen is restored by [`TerminalScreen::leave`] or on drop.
#[derive(Debug)]
pub struct TerminalScreen {
    stdout: Stdout,
    active: bool,
}

impl TerminalScreen {
    /// Switch to the alternate screen and hide the cursor.
    pub fn enter() -> io::Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(Self {
            stdout,
            active: true,
        })
    }

    /// Return to the normal screen. Safe to call more than once.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(self.stdout, LeaveAlternateScreen, Show)
    }
}

impl Screen for TerminalScreen {
    fn size(&self) -> Option<(u16, u16)> {
        terminal::size().ok()
    }

    fn draw(&mut self, lines: &[String]) -> io::Result<()> {
        queue!(self.stdout, MoveTo(0, 0))?;
        for line in lines {
            queue!(
                self.stdout,
                Print(line),
                Clear(ClearType::UntilNewLine),
                MoveToNextLine(1)
            )?;
        }
        queue!(self.stdout, Clear(ClearType::FromCursorDown))?;
        self.stdout.flush()
    }
}

impl Drop for TerminalScreen {
    fn drop(&mut self) {
        if let Err(e) = self.leave() {
            tracing::warn!(error = %e, "Failed to restore terminal");
        }
    }
}
