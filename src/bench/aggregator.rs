//! Result aggregation across runs

use std::collections::HashMap;

use crate::models::{BenchmarkResult, RunningTotals, Subsystem};

/// Running totals plus per-subsystem score history
///
/// Owned and mutated by the coordinating task only, so no locking.
#[derive(Debug, Default, Clone)]
pub struct ResultAggregator {
    totals: RunningTotals,
    history: HashMap<Subsystem, Vec<f64>>,
    last: HashMap<Subsystem, BenchmarkResult>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a completed result to the totals; re-runs are additive
    pub fn record(&mut self, result: &BenchmarkResult) {
        self.totals.cumulative_score += result.total_score;
        self.totals.cumulative_wattage += result.total_wattage;
        self.totals.runs += 1;

        self.history
            .entry(result.subsystem)
            .or_default()
            .push(result.total_score);
        self.last.insert(result.subsystem, result.clone());
    }

    pub fn current_totals(&self) -> RunningTotals {
        self.totals
    }

    /// Scores recorded for `subsystem`, oldest first
    pub fn history(&self, subsystem: Subsystem) -> &[f64] {
        self.history
            .get(&subsystem)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Most recent result recorded for `subsystem`
    pub fn last(&self, subsystem: Subsystem) -> Option<&BenchmarkResult> {
        self.last.get(&subsystem)
    }

    /// Seed from previously persisted results without touching the totals
    pub fn seed_history<'a>(&mut self, results: impl IntoIterator<Item = &'a BenchmarkResult>) {
        for result in results {
            self.history
                .entry(result.subsystem)
                .or_default()
                .push(result.total_score);
        }
    }

    /// Forget every total and every recorded score
    pub fn reset(&mut self) {
        self.totals = RunningTotals::default();
        self.history.clear();
        self.last.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn result(subsystem: Subsystem, score: f64, wattage: f64) -> BenchmarkResult {
        let mut scores = BTreeMap::new();
        scores.insert("x".to_string(), score);
        BenchmarkResult::new(subsystem, scores, score, wattage, Duration::from_millis(1))
    }

    #[test]
    fn test_five_runs_sum() {
        let mut aggregator = ResultAggregator::new();
        for subsystem in Subsystem::ALL {
            aggregator.record(&result(subsystem, 2.0, 0.0));
        }
        let totals = aggregator.current_totals();
        assert_eq!(totals.cumulative_score, 10.0);
        assert_eq!(totals.cumulative_wattage, 0.0);
        assert_eq!(totals.runs, 5);
    }

    #[test]
    fn test_order_independent_sums() {
        let results = [
            result(Subsystem::Cpu, 0.5, 1.0),
            result(Subsystem::Ram, 1.25, 2.5),
            result(Subsystem::Ssd, 3.0, 0.5),
        ];

        let mut forward = ResultAggregator::new();
        results.iter().for_each(|r| forward.record(r));
        let mut backward = ResultAggregator::new();
        results.iter().rev().for_each(|r| backward.record(r));

        assert_eq!(forward.current_totals(), backward.current_totals());
        assert_eq!(forward.current_totals().cumulative_score, 4.75);
        assert_eq!(forward.current_totals().cumulative_wattage, 4.0);
    }

    #[test]
    fn test_reruns_are_additive() {
        let mut aggregator = ResultAggregator::new();
        aggregator.record(&result(Subsystem::Gpu, 1.0, 0.0));
        aggregator.record(&result(Subsystem::Gpu, 3.0, 0.0));

        assert_eq!(aggregator.current_totals().cumulative_score, 4.0);
        assert_eq!(aggregator.history(Subsystem::Gpu), &[1.0, 3.0]);
        assert_eq!(aggregator.last(Subsystem::Gpu).unwrap().total_score, 3.0);
        assert!(aggregator.history(Subsystem::Cpu).is_empty());
        assert!(aggregator.last(Subsystem::Cpu).is_none());
    }

    #[test]
    fn test_seed_and_reset() {
        let mut aggregator = ResultAggregator::new();
        let old = [result(Subsystem::Neural, 0.7, 0.0)];
        aggregator.seed_history(old.iter());
        assert_eq!(aggregator.history(Subsystem::Neural), &[0.7]);
        assert_eq!(aggregator.current_totals().runs, 0);

        aggregator.record(&result(Subsystem::Neural, 0.9, 1.0));
        aggregator.reset();
        assert_eq!(aggregator.current_totals(), RunningTotals::default());
        assert!(aggregator.history(Subsystem::Neural).is_empty());
    }
}
