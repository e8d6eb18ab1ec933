//! End-to-end scenarios for runners, the session and the console runner

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sysmark::bench::{BenchmarkRunner, BenchmarkSession, NullMeter, RunnerEvent, RunnerState};
use sysmark::config::persistence::ResultsStorage;
use sysmark::config::{BenchmarkConfig, CpuConfig};
use sysmark::models::{BenchmarkResult, Subsystem};
use sysmark::simple;
use sysmark::workloads::{workload_fn, WorkloadError, WorkloadOutput};
use sysmark::SysmarkError;
use tempfile::TempDir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(30);

fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Collect session events until every stream has ended
async fn drain(session: &mut BenchmarkSession) -> Vec<(Subsystem, RunnerEvent)> {
    let mut events = Vec::new();
    timeout(WAIT, async {
        while let Some(item) = session.next_event().await {
            events.push(item);
        }
    })
    .await
    .expect("session did not go quiet");
    events
}

#[tokio::test]
async fn test_progress_then_single_result() {
    let mut runner = BenchmarkRunner::new(Subsystem::Cpu);
    let mut events = runner
        .start(workload_fn(|sink| {
            for percent in [10, 50, 100] {
                sink.report_progress(percent);
            }
            Ok(WorkloadOutput {
                per_test_scores: scores(&[("x", 1.0)]),
                total_score: 1.0,
                total_wattage: 0.0,
            })
        }))
        .unwrap();

    let mut percents = Vec::new();
    let mut results: Vec<BenchmarkResult> = Vec::new();
    while let Some(event) = timeout(WAIT, events.recv()).await.unwrap() {
        match event {
            RunnerEvent::Progress(progress) => percents.push(progress.percent),
            RunnerEvent::Completed(result) => results.push(result),
            other => panic!("unexpected event {:?}", other),
        }
    }

    assert_eq!(percents, vec![10, 50, 100]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].total_score, 1.0);
    assert_eq!(results[0].per_test_scores, scores(&[("x", 1.0)]));
    assert_eq!(runner.state(), RunnerState::Completed);
}

#[tokio::test]
async fn test_five_runners_accumulate() {
    let mut session = BenchmarkSession::new(BenchmarkConfig::default(), Arc::new(NullMeter));
    for subsystem in Subsystem::ALL {
        let workload = workload_fn(|_| {
            Ok(WorkloadOutput::from_scores(scores(&[("score", 2.0)]), 0.0))
        });
        session.start_with(subsystem, workload).unwrap();
    }

    let events = drain(&mut session).await;
    let completed = events
        .iter()
        .filter(|(_, e)| matches!(e, RunnerEvent::Completed(_)))
        .count();

    assert_eq!(completed, 5);
    let totals = session.totals();
    assert_eq!(totals.cumulative_score, 10.0);
    assert_eq!(totals.cumulative_wattage, 0.0);
    assert_eq!(totals.runs, 5);
}

#[tokio::test]
async fn test_failure_mid_run_leaves_totals_unchanged() {
    let mut session = BenchmarkSession::new(BenchmarkConfig::default(), Arc::new(NullMeter));
    session
        .start_with(
            Subsystem::Ssd,
            workload_fn(|sink| {
                sink.report_progress(50);
                Err(WorkloadError::Verification("block 3".to_string()))
            }),
        )
        .unwrap();

    let events = drain(&mut session).await;
    assert!(events
        .iter()
        .all(|(_, e)| !matches!(e, RunnerEvent::Completed(_))));
    assert!(matches!(
        events.last(),
        Some((Subsystem::Ssd, RunnerEvent::Failed(WorkloadError::Verification(_))))
    ));
    assert_eq!(session.state(Subsystem::Ssd), RunnerState::Failed);
    assert_eq!(session.totals().runs, 0);
    assert_eq!(session.totals().cumulative_score, 0.0);
}

#[tokio::test]
async fn test_out_of_range_percent_is_verbatim() {
    let mut session = BenchmarkSession::new(BenchmarkConfig::default(), Arc::new(NullMeter));
    session
        .start_with(
            Subsystem::Gpu,
            workload_fn(|sink| {
                sink.report_progress(150);
                sink.report_progress(-5);
                Ok(WorkloadOutput::default())
            }),
        )
        .unwrap();

    let percents: Vec<i32> = drain(&mut session)
        .await
        .into_iter()
        .filter_map(|(_, e)| match e {
            RunnerEvent::Progress(p) => Some(p.percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![150, -5]);
}

#[tokio::test]
async fn test_double_start_keeps_state() {
    let (release, gate) = std::sync::mpsc::channel::<()>();
    let gate = std::sync::Mutex::new(gate);
    let mut runner = BenchmarkRunner::new(Subsystem::Ram);
    let _events = runner
        .start(workload_fn(move |_| {
            let _ = gate.lock().unwrap().recv();
            Ok(WorkloadOutput::default())
        }))
        .unwrap();

    let err = runner
        .start(workload_fn(|_| Ok(WorkloadOutput::default())))
        .unwrap_err();
    assert!(matches!(
        err,
        SysmarkError::InvalidState {
            operation: "start",
            state: RunnerState::Running
        }
    ));
    assert_eq!(runner.state(), RunnerState::Running);

    runner.cancel().unwrap();
    assert_eq!(runner.state(), RunnerState::Cancelled);
    drop(release);
}

fn quick_config(scratch: &TempDir) -> BenchmarkConfig {
    BenchmarkConfig::quick().with_scratch_dir(scratch.path().to_path_buf())
}

#[tokio::test]
async fn test_console_run_records_and_persists() {
    let scratch = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let storage = ResultsStorage::at(data.path().join("results.json"));

    let mut session = BenchmarkSession::new(quick_config(&scratch), Arc::new(NullMeter))
        .with_storage(storage.clone());
    let summary = timeout(
        WAIT,
        simple::run_benchmarks(
            &mut session,
            &[Subsystem::Ram, Subsystem::Cpu],
            std::future::pending(),
        ),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(!summary.interrupted);
    assert!(summary.failures.is_empty());
    let order: Vec<Subsystem> = summary.results.iter().map(|r| r.subsystem).collect();
    assert_eq!(order, vec![Subsystem::Ram, Subsystem::Cpu]);
    assert_eq!(summary.totals.runs, 2);
    assert_eq!(storage.count_results().unwrap(), 2);
}

#[tokio::test]
async fn test_console_run_interrupted() {
    let scratch = TempDir::new().unwrap();
    // Slow enough that cancellation always lands mid-run
    let config = quick_config(&scratch).with_cpu(CpuConfig {
        fibonacci_depth: 30,
        single_core_iterations: 20,
        multi_core_calculations: 2,
    });
    let mut session = BenchmarkSession::new(config, Arc::new(NullMeter));

    let summary = timeout(
        WAIT,
        simple::run_benchmarks(&mut session, &[Subsystem::Cpu, Subsystem::Ram], async {}),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(summary.interrupted);
    assert!(summary.results.is_empty());
    assert_eq!(session.state(Subsystem::Cpu), RunnerState::Cancelled);
    assert_eq!(session.state(Subsystem::Ram), RunnerState::Idle);
    assert_eq!(session.totals().runs, 0);
}

#[tokio::test]
async fn test_quick_workloads_complete() {
    let scratch = TempDir::new().unwrap();
    let mut session = BenchmarkSession::new(quick_config(&scratch), Arc::new(NullMeter));
    for subsystem in Subsystem::ALL {
        session.start(subsystem).unwrap();
    }

    let events = drain(&mut session).await;
    for subsystem in Subsystem::ALL {
        let result = events.iter().find_map(|(s, e)| match e {
            RunnerEvent::Completed(result) if *s == subsystem => Some(result),
            _ => None,
        });
        let result = result.unwrap_or_else(|| panic!("{} did not complete", subsystem));
        assert!(!result.per_test_scores.is_empty());
        assert_eq!(result.total_wattage, 0.0);
    }
    assert_eq!(session.totals().runs, 5);
    // SSD scratch directory is gone after a normal run
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}
