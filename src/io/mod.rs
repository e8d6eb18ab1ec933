//! File I/O helpers
//!
//! Scratch directories with drop cleanup and the synced/offset reads and
//! writes used by the SSD workload.

pub mod scratch;

pub use scratch::ScratchDir;
