//! Per-subsystem dashboard
//!
//! Tabs across the top, then the selected subsystem's gauge, details and
//! score history chart, with the running totals in the footer.

use std::time::Duration;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph, Tabs},
    Frame,
};

use crate::app::state::AppState;
use crate::bench::{BenchmarkSession, RunnerState};
use crate::models::{BenchmarkResult, RunningTotals, Subsystem};
use crate::simple::format_elapsed;
use crate::util::format_watts;

const HELP: &str = "Enter/r start  a start all  c cancel  x reset  Tab switch  q quit";

/// Session data the dashboard reads for one frame
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub state: RunnerState,
    /// Time since start, only while running
    pub elapsed: Option<Duration>,
    pub last: Option<&'a BenchmarkResult>,
    pub history: &'a [f64],
    pub totals: RunningTotals,
}

impl<'a> Snapshot<'a> {
    pub fn of(session: &'a BenchmarkSession, subsystem: Subsystem) -> Self {
        let state = session.state(subsystem);
        let elapsed = match state {
            RunnerState::Running => session.runner(subsystem).and_then(|r| r.elapsed()),
            _ => None,
        };
        Self {
            state,
            elapsed,
            last: session.aggregator().last(subsystem),
            history: session.aggregator().history(subsystem),
            totals: session.totals(),
        }
    }
}

pub fn render(f: &mut Frame, app: &AppState, snapshot: &Snapshot<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Length(3), // Gauge
            Constraint::Length(8), // Details
            Constraint::Min(6),    // History chart
            Constraint::Length(4), // Totals and help
        ])
        .split(f.size());

    render_tabs(f, chunks[0], app);
    render_gauge(f, chunks[1], app);
    render_details(f, chunks[2], app, snapshot);
    render_chart(f, chunks[3], app.selected(), snapshot.history);
    render_footer(f, chunks[4], app, &snapshot.totals);
}

fn render_tabs(f: &mut Frame, area: Rect, app: &AppState) {
    let titles: Vec<Line> = Subsystem::ALL
        .iter()
        .enumerate()
        .map(|(i, s)| Line::from(format!("{} {}", i + 1, s.label())))
        .collect();

    let tabs = Tabs::new(titles)
        .block(Block::default().title("SYSMARK").borders(Borders::ALL))
        .select(app.selected_index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn render_gauge(f: &mut Frame, area: Rect, app: &AppState) {
    let view = app.view(app.selected());
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title("Progress")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .gauge_style(Style::default().fg(Color::Green))
        .percent(view.percent)
        .label(format!("{}%", view.percent));

    f.render_widget(gauge, area);
}

fn state_style(state: RunnerState) -> Style {
    match state {
        RunnerState::Idle => Style::default().fg(Color::Gray),
        RunnerState::Running => Style::default().fg(Color::Yellow),
        RunnerState::Completed => Style::default().fg(Color::Green),
        RunnerState::Cancelled => Style::default().fg(Color::Magenta),
        RunnerState::Failed => Style::default().fg(Color::Red),
    }
}

fn render_details(f: &mut Frame, area: Rect, app: &AppState, snapshot: &Snapshot<'_>) {
    let view = app.view(app.selected());
    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Cyan));

    let status = if view.status.is_empty() { "-" } else { view.status.as_str() };
    let elapsed = snapshot
        .elapsed
        .or(snapshot.last.map(|result| result.elapsed))
        .map(format_elapsed)
        .unwrap_or_else(|| "-".to_string());
    let (score, wattage) = match snapshot.last {
        Some(result) => (
            format!("{:.4}", result.total_score),
            format_watts(result.total_wattage),
        ),
        None => ("-".to_string(), "-".to_string()),
    };

    let mut lines = vec![
        Line::from(vec![label("Status:     "), Span::raw(status)]),
        Line::from(vec![
            label("State:      "),
            Span::styled(snapshot.state.to_string(), state_style(snapshot.state)),
        ]),
        Line::from(vec![label("Elapsed:    "), Span::raw(elapsed)]),
        Line::from(vec![label("Last score: "), Span::raw(score)]),
        Line::from(vec![label("Wattage:    "), Span::raw(wattage)]),
    ];
    if let Some(error) = &view.error {
        lines.push(Line::from(vec![
            label("Error:      "),
            Span::styled(error.clone(), Style::default().fg(Color::Red)),
        ]));
    }

    let details = Paragraph::new(lines).block(
        Block::default()
            .title(app.selected().description())
            .borders(Borders::ALL),
    );
    f.render_widget(details, area);
}

fn render_chart(f: &mut Frame, area: Rect, subsystem: Subsystem, history: &[f64]) {
    let block = Block::default()
        .title(format!("{} score history", subsystem.label()))
        .borders(Borders::ALL);

    if history.is_empty() {
        let empty = Paragraph::new("No results yet")
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let data: Vec<(f64, f64)> = history
        .iter()
        .enumerate()
        .map(|(i, &score)| (i as f64, score))
        .collect();
    let (x_bounds, y_bounds) = chart_bounds(history);

    let dataset = Dataset::default()
        .name("score")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .title("run")
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(vec![
                    Span::raw("1"),
                    Span::raw(history.len().to_string()),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(vec![
                    Span::raw(format!("{:.3}", y_bounds[0])),
                    Span::raw(format!("{:.3}", y_bounds[1])),
                ]),
        );

    f.render_widget(chart, area);
}

/// Axis bounds with some headroom; a flat or single-point series still
/// gets a non-empty range
pub(crate) fn chart_bounds(history: &[f64]) -> ([f64; 2], [f64; 2]) {
    let x_max = (history.len().saturating_sub(1) as f64).max(1.0);

    let min = history.iter().copied().fold(f64::INFINITY, f64::min);
    let max = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return ([0.0, x_max], [0.0, 1.0]);
    }

    let pad = if max > min { (max - min) * 0.1 } else { min.abs().max(1.0) * 0.1 };
    ([0.0, x_max], [min - pad, max + pad])
}

fn render_footer(f: &mut Frame, area: Rect, app: &AppState, totals: &RunningTotals) {
    let totals_line = Line::from(vec![
        Span::styled("Totals: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            "score {:.4}  wattage {}  runs {}",
            totals.cumulative_score,
            format_watts(totals.cumulative_wattage),
            totals.runs
        )),
    ]);
    let second = match app.message() {
        Some(message) => Line::from(Span::styled(message, Style::default().fg(Color::Yellow))),
        None => Line::from(Span::styled(HELP, Style::default().fg(Color::DarkGray))),
    };

    let footer = Paragraph::new(vec![totals_line, second])
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}
