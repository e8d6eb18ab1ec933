//! Results persistence module
//!
//! Handles saving, loading, and rotation of benchmark results.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::{BenchmarkResult, Subsystem};
use crate::{Result, SysmarkError, APP_NAME, MAX_RESULTS_HISTORY, RESULTS_FILE};

/// Results storage manager
#[derive(Debug, Clone)]
pub struct ResultsStorage {
    results_path: PathBuf,
}

/// Results file structure for JSON persistence
#[derive(Debug, Serialize, Deserialize)]
struct ResultsFile {
    version: u32,
    results: Vec<BenchmarkResult>,
}

impl ResultsStorage {
    /// Create a storage manager for the standard results file
    pub fn new() -> Result<Self> {
        Ok(Self::at(Self::results_file_path()?))
    }

    /// Create a storage manager for an explicit file
    pub fn at(results_path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: results_path.into(),
        }
    }

    /// Get the standard results file path
    /// Uses $DATA_HOME/sysmark/results.json
    pub fn results_file_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            SysmarkError::Persistence("Unable to determine data directory".to_string())
        })?;

        Ok(data_dir.join(APP_NAME).join(RESULTS_FILE))
    }

    /// Load all results from the results file, oldest first
    pub fn load_results(&self) -> Result<Vec<BenchmarkResult>> {
        if !self.results_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.results_path).map_err(|e| {
            SysmarkError::Persistence(format!(
                "Failed to read results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        let results_file: ResultsFile = serde_json::from_str(&content).map_err(|e| {
            SysmarkError::Persistence(format!(
                "Failed to parse results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        Ok(results_file.results)
    }

    /// Append a new result to the results file
    /// Automatically rotates old results if the file exceeds MAX_RESULTS_HISTORY entries
    pub fn append_result(&self, result: BenchmarkResult) -> Result<()> {
        let mut results = self.load_results()?;
        results.push(result);

        if results.len() > MAX_RESULTS_HISTORY {
            let skip_count = results.len() - MAX_RESULTS_HISTORY;
            results.drain(..skip_count);
        }

        self.save_results(results)
    }

    fn save_results(&self, results: Vec<BenchmarkResult>) -> Result<()> {
        if let Some(parent) = self.results_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SysmarkError::Persistence(format!(
                    "Failed to create results directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let results_file = ResultsFile {
            version: 1,
            results,
        };

        let content = serde_json::to_string_pretty(&results_file)?;

        fs::write(&self.results_path, content).map_err(|e| {
            SysmarkError::Persistence(format!(
                "Failed to write results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the number of stored results
    pub fn count_results(&self) -> Result<usize> {
        Ok(self.load_results()?.len())
    }

    /// Clear all stored results
    pub fn clear_results(&self) -> Result<()> {
        if self.results_path.exists() {
            fs::remove_file(&self.results_path).map_err(|e| {
                SysmarkError::Persistence(format!(
                    "Failed to remove results file {}: {}",
                    self.results_path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Get the most recent N results, oldest first
    pub fn get_recent_results(&self, count: usize) -> Result<Vec<BenchmarkResult>> {
        let mut results = self.load_results()?;
        if results.len() > count {
            results.drain(..results.len() - count);
        }
        Ok(results)
    }

    /// Get every stored result of one subsystem, oldest first
    pub fn results_for(&self, subsystem: Subsystem) -> Result<Vec<BenchmarkResult>> {
        Ok(self
            .load_results()?
            .into_iter()
            .filter(|r| r.subsystem == subsystem)
            .collect())
    }

    /// Get results file path for external access
    pub fn results_path(&self) -> &Path {
        &self.results_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_result(subsystem: Subsystem, score: f64) -> BenchmarkResult {
        let mut scores = BTreeMap::new();
        scores.insert("bandwidth".to_string(), score);
        BenchmarkResult::new(subsystem, scores, score, 0.0, Duration::from_secs(2))
    }

    fn storage_in(temp_dir: &TempDir) -> ResultsStorage {
        ResultsStorage::at(temp_dir.path().join("results.json"))
    }

    #[test]
    fn test_results_storage_new() {
        let storage = ResultsStorage::new();
        assert!(storage.is_ok());
        assert!(storage.unwrap().results_path().ends_with("sysmark/results.json"));
    }

    #[test]
    fn test_load_empty_results() {
        let temp_dir = TempDir::new().unwrap();
        let results = storage_in(&temp_dir).load_results().unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_append_and_load_result() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);

        storage
            .append_result(create_test_result(Subsystem::Ram, 3.5))
            .unwrap();

        let results = storage.load_results().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].subsystem, Subsystem::Ram);
        assert_eq!(results[0].total_score, 3.5);
    }

    #[test]
    fn test_results_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);

        for i in 0..MAX_RESULTS_HISTORY + 10 {
            storage
                .append_result(create_test_result(Subsystem::Cpu, i as f64))
                .unwrap();
        }

        let results = storage.load_results().unwrap();
        assert_eq!(results.len(), MAX_RESULTS_HISTORY);

        // First 10 should be gone
        assert_eq!(results[0].total_score, 10.0);
        assert_eq!(
            results[results.len() - 1].total_score,
            (MAX_RESULTS_HISTORY + 10 - 1) as f64
        );
    }

    #[test]
    fn test_count_and_clear_results() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);
        assert_eq!(storage.count_results().unwrap(), 0);

        for _ in 0..3 {
            storage
                .append_result(create_test_result(Subsystem::Ssd, 1.0))
                .unwrap();
        }
        assert_eq!(storage.count_results().unwrap(), 3);

        storage.clear_results().unwrap();
        assert_eq!(storage.count_results().unwrap(), 0);
        // Clearing twice is fine
        storage.clear_results().unwrap();
    }

    #[test]
    fn test_get_recent_results() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);

        for i in 0..10 {
            storage
                .append_result(create_test_result(Subsystem::Gpu, i as f64))
                .unwrap();
        }

        let recent = storage.get_recent_results(5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].total_score, 5.0);
        assert_eq!(recent[4].total_score, 9.0);

        let all_recent = storage.get_recent_results(20).unwrap();
        assert_eq!(all_recent.len(), 10);
    }

    #[test]
    fn test_results_for_subsystem() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);

        storage.append_result(create_test_result(Subsystem::Cpu, 1.0)).unwrap();
        storage.append_result(create_test_result(Subsystem::Ram, 2.0)).unwrap();
        storage.append_result(create_test_result(Subsystem::Cpu, 3.0)).unwrap();

        let cpu = storage.results_for(Subsystem::Cpu).unwrap();
        let scores: Vec<f64> = cpu.iter().map(|r| r.total_score).collect();
        assert_eq!(scores, vec![1.0, 3.0]);
        assert!(storage.results_for(Subsystem::Neural).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);
        fs::write(storage.results_path(), "{ not json").unwrap();

        assert!(matches!(
            storage.load_results(),
            Err(SysmarkError::Persistence(_))
        ));
    }

    #[test]
    fn test_results_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);

        storage
            .append_result(create_test_result(Subsystem::Neural, 0.5))
            .unwrap();

        let content = fs::read_to_string(storage.results_path()).unwrap();
        let results_file: ResultsFile = serde_json::from_str(&content).unwrap();

        assert_eq!(results_file.version, 1);
        assert_eq!(results_file.results.len(), 1);
        assert!(content.contains("\"subsystem\": \"neural\""));
    }
}
