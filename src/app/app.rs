//! Main application controller
//!
//! Owns the terminal, the view state and the benchmark session. Each tick it
//! drains session events, redraws and handles at most one key press.

use tracing::debug;

use crate::{
    app::{
        screens::{self, Snapshot},
        state::{Action, AppState},
        tui::Tui,
    },
    bench::BenchmarkSession,
    error::user_friendly_message,
    models::Subsystem,
    Result, SysmarkError,
};

/// TUI application controller
pub struct App {
    tui: Tui,
    state: AppState,
    session: BenchmarkSession,
}

impl App {
    pub fn new(session: BenchmarkSession) -> Result<Self> {
        let tui = Tui::new().map_err(|e| SysmarkError::Tui(e.to_string()))?;
        Ok(Self {
            tui,
            state: AppState::new(),
            session,
        })
    }

    /// Run until the user quits; the terminal is restored on every exit path
    pub async fn run(&mut self) -> Result<()> {
        self.tui
            .init()
            .map_err(|e| SysmarkError::Tui(format!("cannot initialise terminal: {}", e)))?;

        let result = self.event_loop().await;

        let cancelled = self.session.cancel_all();
        debug!(cancelled, "tui closed");
        self.tui
            .restore()
            .map_err(|e| SysmarkError::Tui(format!("cannot restore terminal: {}", e)))?;
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        while !self.state.should_quit() {
            drain_events(&mut self.session, &mut self.state);

            let (state, session) = (&self.state, &self.session);
            self.tui
                .draw(|f| screens::render(f, state, &Snapshot::of(session, state.selected())))?;

            if let Some(key) = self.tui.next_key()? {
                handle_action(&mut self.session, &mut self.state, Action::from_key(key));
            }

            // Let the forwarding tasks run between ticks
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

/// Apply every event that is already waiting
pub(crate) fn drain_events(session: &mut BenchmarkSession, state: &mut AppState) {
    while let Some((subsystem, event)) = session.try_next_event() {
        state.apply_event(subsystem, &event);
    }
}

fn start(session: &mut BenchmarkSession, state: &mut AppState, subsystem: Subsystem) -> bool {
    match session.start(subsystem) {
        Ok(()) => {
            state.on_started(subsystem);
            true
        }
        Err(e) => {
            state.set_message(format!("{}: {}", subsystem.label(), user_friendly_message(&e)));
            false
        }
    }
}

pub(crate) fn handle_action(session: &mut BenchmarkSession, state: &mut AppState, action: Action) {
    let selected = state.selected();
    match action {
        Action::Start => {
            if start(session, state, selected) {
                state.set_message(format!("{} started", selected.description()));
            }
        }
        Action::StartAll => {
            let mut started = 0;
            for subsystem in Subsystem::ALL {
                if !session.is_running(subsystem) && start(session, state, subsystem) {
                    started += 1;
                }
            }
            state.set_message(format!("Started {} benchmark(s)", started));
        }
        Action::Cancel => match session.cancel(selected) {
            Ok(()) => state.set_message(format!("{} cancelled", selected.description())),
            Err(e) => state.set_message(format!("{}: {}", selected.label(), e)),
        },
        Action::ResetTotals => {
            session.reset_totals();
            state.set_message("Totals and score history reset");
        }
        Action::NextTab => state.next_tab(),
        Action::PreviousTab => state.previous_tab(),
        Action::Select(index) => state.select(index),
        Action::Quit => {
            session.cancel_all();
            state.quit();
        }
        Action::None => {}
    }
}
