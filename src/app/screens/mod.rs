//! TUI screen components

pub mod dashboard;

pub use dashboard::{render, Snapshot};
