//! Line-oriented console front end
//!
//! Runs the selected subsystems one after another with an `indicatif` bar
//! per run, then prints the scores and the running totals.

use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::bench::{BenchmarkSession, RunnerEvent};
use crate::config::BenchmarkConfig;
use crate::error::user_friendly_message;
use crate::models::{BenchmarkResult, RunningTotals, Subsystem};
use crate::util::format_watts;
use crate::workloads::WorkloadError;
use crate::{Result, SysmarkError};

/// Outcome of a console run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Completed results, in run order
    pub results: Vec<BenchmarkResult>,
    pub failures: Vec<(Subsystem, WorkloadError)>,
    /// Set when the shutdown signal cut the run short
    pub interrupted: bool,
    pub totals: RunningTotals,
}

/// How a single subsystem run ended
enum Outcome {
    Completed(BenchmarkResult),
    Failed(WorkloadError),
    Cancelled,
}

fn progress_bar(subsystem: Subsystem) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{spinner} {prefix:>6} [{bar:30}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_prefix(subsystem.label());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Run `subsystems` in order on `session`
///
/// When `shutdown` resolves every running benchmark is cancelled and the
/// remaining subsystems are skipped.
pub async fn run_benchmarks<F>(
    session: &mut BenchmarkSession,
    subsystems: &[Subsystem],
    shutdown: F,
) -> Result<RunSummary>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut summary = RunSummary::default();

    for &subsystem in subsystems {
        if summary.interrupted {
            break;
        }

        session.start(subsystem)?;
        let pb = progress_bar(subsystem);

        let outcome = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown, if !summary.interrupted => {
                    summary.interrupted = true;
                    warn!("interrupted, cancelling running benchmarks");
                    session.cancel_all();
                }
                event = session.next_event() => match event {
                    Some((_, RunnerEvent::Progress(progress))) => {
                        pb.set_position(u64::from(progress.display_percent()));
                        if !progress.status.is_empty() {
                            pb.set_message(progress.status);
                        }
                    }
                    Some((_, RunnerEvent::Completed(result))) => break Outcome::Completed(result),
                    Some((_, RunnerEvent::Failed(err))) => break Outcome::Failed(err),
                    Some((_, RunnerEvent::Cancelled)) | None => break Outcome::Cancelled,
                },
            }
        };

        match outcome {
            Outcome::Completed(result) => {
                pb.finish_with_message("done");
                println!("{}", format_result(&result));
                summary.results.push(result);
            }
            Outcome::Failed(err) => {
                pb.abandon_with_message("failed");
                let error = SysmarkError::Workload(err);
                println!(
                    "{} benchmark failed: {}\n",
                    subsystem.label(),
                    user_friendly_message(&error)
                );
                if let SysmarkError::Workload(err) = error {
                    summary.failures.push((subsystem, err));
                }
            }
            Outcome::Cancelled => {
                pb.abandon_with_message("cancelled");
                println!("{} benchmark cancelled\n", subsystem.label());
            }
        }
    }

    summary.totals = session.totals();
    println!("{}", format_totals(&summary.totals));
    Ok(summary)
}

/// Multi-line report of one result
pub fn format_result(result: &BenchmarkResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", result.subsystem.description());
    for (test, score) in &result.per_test_scores {
        let _ = writeln!(out, "  {:<22} {:>12.4}", test, score);
    }
    let _ = writeln!(out, "  {:<22} {:>12.4}", "total score", result.total_score);
    let _ = writeln!(out, "  {:<22} {:>12}", "wattage", format_watts(result.total_wattage));
    let _ = writeln!(out, "  {:<22} {:>12}", "elapsed", format_elapsed(result.elapsed));
    out
}

pub fn format_totals(totals: &RunningTotals) -> String {
    format!(
        "Totals over {} run(s): score {:.4}, wattage {}",
        totals.runs,
        totals.cumulative_score,
        format_watts(totals.cumulative_wattage)
    )
}

/// Elapsed time at millisecond resolution, e.g. `1s 250ms`
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = Duration::from_millis(elapsed.as_millis() as u64);
    humantime::format_duration(millis).to_string()
}

/// Print saved results, most recent last
pub fn print_history(results: &[BenchmarkResult]) {
    if results.is_empty() {
        println!("No saved results.");
        return;
    }
    for result in results {
        println!("{}", result.summary());
    }
}

/// Print the effective configuration as TOML
pub fn print_config(config: &BenchmarkConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn result() -> BenchmarkResult {
        let mut scores = BTreeMap::new();
        scores.insert("single_core".to_string(), 0.5);
        scores.insert("multi_core".to_string(), 0.25);
        BenchmarkResult::new(Subsystem::Cpu, scores, 0.75, 0.0, Duration::from_millis(1250))
    }

    #[test]
    fn test_format_result() {
        let text = format_result(&result());
        assert!(text.starts_with(Subsystem::Cpu.description()));
        assert!(text.contains("multi_core"));
        assert!(text.contains("0.7500"));
        assert!(text.contains("n/a"));
        assert!(text.contains("1s 250ms"));
    }

    #[test]
    fn test_format_elapsed_drops_sub_millisecond() {
        assert_eq!(format_elapsed(Duration::from_micros(2_000_900)), "2s");
        assert_eq!(format_elapsed(Duration::ZERO), "0s");
    }

    #[test]
    fn test_format_totals() {
        let totals = RunningTotals {
            cumulative_score: 10.0,
            cumulative_wattage: 0.0,
            runs: 5,
        };
        assert_eq!(format_totals(&totals), "Totals over 5 run(s): score 10.0000, wattage n/a");
    }
}
