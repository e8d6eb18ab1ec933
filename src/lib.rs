//! SYSMARK - whole-system benchmark
//!
//! Runs synthetic CPU, GPU, RAM, SSD and neural-network workloads on
//! background threads, streams their progress to a console or TUI front
//! end and keeps running score/wattage totals across runs.

use thiserror::Error;

// Public re-exports
pub mod app;
pub mod bench;
pub mod cli;
pub mod config;
pub mod io;
pub mod models;
pub mod simple;
pub mod util;
pub mod workloads;

pub use bench::runner::RunnerState;
pub use workloads::WorkloadError;

// Common error types
#[derive(Error, Debug)]
pub enum SysmarkError {
    /// Operation not allowed in the runner's or session's current state
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: RunnerState,
    },
    /// The workload returned an error or panicked
    #[error("Workload failed: {0}")]
    Workload(#[from] WorkloadError),
    /// A run ended through cancellation rather than completion
    #[error("Cancelled: {0}")]
    Cancelled(String),
    /// Configuration validation or parsing error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Results persistence error
    #[error("Results persistence error: {0}")]
    Persistence(String),
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TUI rendering or interaction error
    #[error("TUI error: {0}")]
    Tui(String),
}

impl From<serde_json::Error> for SysmarkError {
    fn from(err: serde_json::Error) -> Self {
        SysmarkError::Persistence(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for SysmarkError {
    fn from(err: toml::de::Error) -> Self {
        SysmarkError::Config(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for SysmarkError {
    fn from(err: toml::ser::Error) -> Self {
        SysmarkError::Config(format!("TOML serialization error: {}", err))
    }
}

/// Result type alias for SYSMARK operations
pub type Result<T> = std::result::Result<T, SysmarkError>;

/// Error handling utilities
pub mod error {
    use super::SysmarkError;
    use crate::workloads::WorkloadError;

    /// Cancellation is an expected way for a run to end, not a failure
    pub fn is_cancellation(error: &SysmarkError) -> bool {
        matches!(error, SysmarkError::Cancelled(_))
    }

    /// Convert error to user-friendly message with suggestions
    pub fn user_friendly_message(error: &SysmarkError) -> String {
        match error {
            SysmarkError::InvalidState { .. } => {
                "That benchmark is already running or has finished. Start a new run instead."
                    .to_string()
            }
            SysmarkError::Workload(WorkloadError::Io(_)) => {
                "Benchmark I/O failed. Check disk space and permissions of the scratch directory."
                    .to_string()
            }
            SysmarkError::Workload(WorkloadError::Verification(msg)) => {
                format!("Data read back did not match what was written ({}).", msg)
            }
            SysmarkError::Workload(WorkloadError::Panicked(_)) => {
                "The benchmark crashed. Try a smaller configuration.".to_string()
            }
            SysmarkError::Config(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            SysmarkError::Persistence(_) => {
                "Failed to save results. Check disk space and permissions.".to_string()
            }
            SysmarkError::Cancelled(_) => "Benchmark was cancelled.".to_string(),
            _ => error.to_string(),
        }
    }
}

// Common types and constants
pub const APP_NAME: &str = "sysmark";
pub const CONFIG_FILE: &str = "sysmark.toml";
pub const RESULTS_FILE: &str = "results.json";
pub const LOG_FILE: &str = "sysmark.log";
pub const SCRATCH_DIR_PREFIX: &str = "SYSMARK_TMP_";
pub const MAX_RESULTS_HISTORY: usize = 100;
