//! Application state management
//!
//! Holds what the dashboard shows that the session does not track itself:
//! the selected tab, the latest progress of each subsystem and the message
//! line. Kept free of terminal types other than key events so it can be
//! tested without a terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::bench::RunnerEvent;
use crate::models::Subsystem;

/// What a key press asks the application to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start the selected subsystem (Enter, r)
    Start,
    /// Start every subsystem that is not running (a)
    StartAll,
    /// Cancel the selected subsystem (c)
    Cancel,
    /// Forget totals and score history (x)
    ResetTotals,
    /// Next tab (Tab, Right, l)
    NextTab,
    /// Previous tab (Shift+Tab, Left, h)
    PreviousTab,
    /// Jump to a tab by index (1-5)
    Select(usize),
    /// Cancel everything and leave (q, Esc, Ctrl+C)
    Quit,
    None,
}

impl Action {
    pub fn from_key(key: KeyEvent) -> Self {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,

            KeyCode::Enter | KeyCode::Char('r') => Action::Start,
            KeyCode::Char('a') => Action::StartAll,
            KeyCode::Char('c') => Action::Cancel,
            KeyCode::Char('x') => Action::ResetTotals,

            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => Action::NextTab,
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => Action::PreviousTab,
            KeyCode::Char(c @ '1'..='9') => {
                let index = (c as u8 - b'1') as usize;
                if index < Subsystem::ALL.len() {
                    Action::Select(index)
                } else {
                    Action::None
                }
            }

            _ => Action::None,
        }
    }
}

/// Latest progress of one subsystem as shown on its tab
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubsystemView {
    /// Clamped to 0..=100 for the gauge
    pub percent: u16,
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct AppState {
    selected: usize,
    views: [SubsystemView; 5],
    message: Option<String>,
    should_quit: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            selected: 0,
            views: Default::default(),
            message: None,
            should_quit: false,
        }
    }

    pub fn selected(&self) -> Subsystem {
        Subsystem::ALL[self.selected]
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn next_tab(&mut self) {
        self.selected = (self.selected + 1) % Subsystem::ALL.len();
    }

    pub fn previous_tab(&mut self) {
        self.selected = (self.selected + Subsystem::ALL.len() - 1) % Subsystem::ALL.len();
    }

    pub fn select(&mut self, index: usize) {
        if index < Subsystem::ALL.len() {
            self.selected = index;
        }
    }

    pub fn view(&self, subsystem: Subsystem) -> &SubsystemView {
        &self.views[index_of(subsystem)]
    }

    /// A new run starts from an empty gauge
    pub fn on_started(&mut self, subsystem: Subsystem) {
        self.views[index_of(subsystem)] = SubsystemView {
            percent: 0,
            status: "Starting".to_string(),
            error: None,
        };
    }

    pub fn apply_event(&mut self, subsystem: Subsystem, event: &RunnerEvent) {
        let view = &mut self.views[index_of(subsystem)];
        match event {
            RunnerEvent::Progress(progress) => {
                view.percent = progress.display_percent();
                if !progress.status.is_empty() {
                    view.status = progress.status.clone();
                }
            }
            RunnerEvent::Completed(_) => {
                view.percent = 100;
                view.status = "Completed".to_string();
            }
            RunnerEvent::Failed(err) => {
                view.status = "Failed".to_string();
                view.error = Some(err.to_string());
            }
            RunnerEvent::Cancelled => {
                view.status = "Cancelled".to_string();
            }
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn index_of(subsystem: Subsystem) -> usize {
    Subsystem::ALL
        .iter()
        .position(|&s| s == subsystem)
        .unwrap_or(0)
}
