//! TUI controller for managing the display lifecycle.
//!
//! The TuiController owns the terminal while the interactive screen is
//! shown. It enters and leaves the alternate screen, draws the current
//! state and reads key presses. Outside of TUI mode every call is a no-op.

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, Terminal};

use super::display_mode::DisplayMode;
use super::renderer::render_frame;
use super::state::{Screen, TuiState};
use crate::errors::NetSpeedError;

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// `q`, `Esc` or `Ctrl-C`: stop the run, or leave when idle
    Quit,
    /// `r`: start another run
    Rerun,
    /// `e`: export the history
    Export,
}

/// Map a key event to an action.
pub fn key_action(key: KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Quit)
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        KeyCode::Char('r') => Some(KeyAction::Rerun),
        KeyCode::Char('e') => Some(KeyAction::Export),
        _ => None,
    }
}

fn terminal_error(error: io::Error) -> NetSpeedError {
    NetSpeedError::display("could not drive the terminal")
        .with_suggestion("Use --json or redirect the output to skip the interactive screen.")
        .with_source(error)
}

/// Controller for the TUI display.
pub struct TuiController {
    /// Current display mode
    mode: DisplayMode,
    /// State rendered on every frame
    state: TuiState,
    /// Terminal instance (only present in TUI mode)
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl TuiController {
    pub fn new(mode: DisplayMode, screen: Screen) -> Self {
        Self { mode, state: TuiState::new(screen), terminal: None, initialized: false }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn state(&self) -> &TuiState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TuiState {
        &mut self.state
    }

    /// Enter the alternate screen and hide the cursor.
    pub fn init(&mut self) -> Result<(), NetSpeedError> {
        if self.mode != DisplayMode::Tui || self.initialized {
            return Ok(());
        }

        enable_raw_mode().map_err(terminal_error)?;
        self.initialized = true;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide).map_err(terminal_error)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout)).map_err(terminal_error)?;
        self.terminal = Some(terminal);

        Ok(())
    }

    /// Leave the alternate screen, show the cursor and restore the
    /// terminal mode.
    pub fn cleanup(&mut self) -> Result<(), NetSpeedError> {
        if !self.initialized {
            return Ok(());
        }

        if let Some(ref mut terminal) = self.terminal {
            execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)
                .map_err(terminal_error)?;
        }

        disable_raw_mode().map_err(terminal_error)?;

        self.initialized = false;
        self.terminal = None;

        Ok(())
    }

    /// Draw the current state.
    pub fn render(&mut self) -> Result<(), NetSpeedError> {
        let Some(ref mut terminal) = self.terminal else {
            return Ok(());
        };

        let size = terminal.size().map_err(terminal_error)?;
        self.state.terminal_width = size.width;

        let state = &self.state;
        terminal.draw(|frame| render_frame(frame, state)).map_err(terminal_error)?;

        Ok(())
    }

    /// Wait up to `timeout` for a key press that maps to an action.
    pub fn next_key(&mut self, timeout: Duration) -> Result<Option<KeyAction>, NetSpeedError> {
        if self.terminal.is_none() {
            return Ok(None);
        }

        if !event::poll(timeout).map_err(terminal_error)? {
            return Ok(None);
        }

        match event::read().map_err(terminal_error)? {
            Event::Key(key) => Ok(key_action(key)),
            _ => Ok(None),
        }
    }
}

impl Drop for TuiController {
    /// Restore the terminal even when `cleanup` was not called.
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_quit_keys() {
        for key in [
            press(KeyCode::Char('q'), KeyModifiers::NONE),
            press(KeyCode::Esc, KeyModifiers::NONE),
            press(KeyCode::Char('c'), KeyModifiers::CONTROL),
        ] {
            assert_eq!(key_action(key), Some(KeyAction::Quit));
        }
    }

    #[test]
    fn test_plain_c_is_ignored() {
        assert_eq!(key_action(press(KeyCode::Char('c'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_rerun_and_export_keys() {
        assert_eq!(
            key_action(press(KeyCode::Char('r'), KeyModifiers::NONE)),
            Some(KeyAction::Rerun)
        );
        assert_eq!(
            key_action(press(KeyCode::Char('e'), KeyModifiers::NONE)),
            Some(KeyAction::Export)
        );
    }

    #[test]
    fn test_key_release_is_ignored() {
        let release = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(key_action(release), None);
    }

    #[test]
    fn test_non_tui_modes_never_touch_the_terminal() {
        for mode in [DisplayMode::Silent, DisplayMode::Json] {
            let mut controller = TuiController::new(mode, Screen::Run);
            assert!(controller.init().is_ok());
            assert!(controller.terminal.is_none());
            assert!(controller.render().is_ok());
            assert_eq!(controller.next_key(Duration::ZERO).unwrap(), None);
            assert!(controller.cleanup().is_ok());
        }
    }

    #[test]
    fn test_state_is_editable() {
        let mut controller = TuiController::new(DisplayMode::Silent, Screen::Chart);
        controller.state_mut().set_notice("Exported");

        assert_eq!(controller.state().screen, Screen::Chart);
        assert_eq!(controller.state().notice.as_deref(), Some("Exported"));
    }
}
