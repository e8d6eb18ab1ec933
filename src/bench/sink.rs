//! Progress reporting capability handed to workloads

use std::sync::Mutex;

/// Capability a workload uses to report how far along it is
///
/// Implementations must be callable from any thread and must never block
/// the caller for long or fail. Percent values are not validated.
pub trait ProgressSink: Send + Sync {
    /// Report completion percentage
    fn report_progress(&self, percent: i32);

    /// Report a human-readable description of the current test
    fn report_status(&self, text: &str);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report_progress(&self, _percent: i32) {}

    fn report_status(&self, _text: &str) {}
}

/// Reported item captured by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Progress(i32),
    Status(String),
}

/// Sink that keeps every report in memory, in call order
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<Report>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Only the percent values, in order
    pub fn percents(&self) -> Vec<i32> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Progress(p) => Some(p),
                Report::Status(_) => None,
            })
            .collect()
    }

    /// Only the status texts, in order
    pub fn statuses(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Status(s) => Some(s),
                Report::Progress(_) => None,
            })
            .collect()
    }

    fn push(&self, report: Report) {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(report);
    }
}

impl ProgressSink for RecordingSink {
    fn report_progress(&self, percent: i32) {
        self.push(Report::Progress(percent));
    }

    fn report_status(&self, text: &str) {
        self.push(Report::Status(text.to_string()));
    }
}
