//! Configuration management module
//!
//! Handles loading, saving, and validation of the workload parameters
//! and session preferences.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, SysmarkError, APP_NAME, CONFIG_FILE};

pub mod persistence;

/// CPU workload parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Argument of the recursive Fibonacci calculation
    pub fibonacci_depth: u32,
    /// Calculations timed one after another on a single core
    pub single_core_iterations: usize,
    /// Calculations spread over all cores; 0 means one per logical CPU
    pub multi_core_calculations: usize,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            fibonacci_depth: 35,
            single_core_iterations: 10,
            multi_core_calculations: 10,
        }
    }
}

/// Tensor kernel parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub matrix_size: usize,
    pub matrix_iterations: usize,
    pub vector_size: usize,
    pub vector_iterations: usize,
    /// Side length of the square input image
    pub image_size: usize,
    pub conv_iterations: usize,
    pub custom_iterations: usize,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            matrix_size: 256,
            matrix_iterations: 20,
            vector_size: 1000,
            vector_iterations: 10_000,
            image_size: 100,
            conv_iterations: 50,
            custom_iterations: 10_000,
        }
    }
}

/// RAM workload parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RamConfig {
    /// Final size of the buffer (in MiB)
    pub memory_mb: usize,
    /// Number of equal allocation steps
    pub iterations: usize,
}

impl Default for RamConfig {
    fn default() -> Self {
        Self {
            memory_mb: 1024,
            iterations: 20,
        }
    }
}

/// SSD workload parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsdConfig {
    /// Directory in which the scratch directory is created
    pub scratch_dir: PathBuf,
    /// Sizes of the verified round-trip files (in KiB)
    pub file_sizes_kb: Vec<u64>,
    /// Size of the sequential/random pass file (in MiB)
    pub large_file_mb: u64,
    /// Whether to keep the scratch directory after testing
    pub keep_temp_files: bool,
}

impl Default for SsdConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            file_sizes_kb: vec![4, 64, 1024, 16 * 1024, 64 * 1024],
            large_file_mb: 100,
            keep_temp_files: false,
        }
    }
}

/// Neural network workload parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub classes: usize,
    pub inference_iterations: usize,
    pub training_samples: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub batch_size: usize,
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            input_size: 64,
            hidden_size: 128,
            classes: 10,
            inference_iterations: 1000,
            training_samples: 1000,
            epochs: 10,
            learning_rate: 0.05,
            batch_size: 32,
        }
    }
}

/// Power measurement settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Shell out to `command` for readings; otherwise every reading is 0.0
    pub enabled: bool,
    pub command: String,
    /// Sampling interval passed to the tool (in milliseconds)
    pub sample_ms: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "powermetrics".to_string(),
            sample_ms: 1000,
        }
    }
}

/// Session preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Append completed results to the history file
    pub save_results: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { save_results: true }
    }
}

/// Benchmark configuration structure containing all test parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub cpu: CpuConfig,
    pub gpu: GpuConfig,
    pub ram: RamConfig,
    pub ssd: SsdConfig,
    pub neural: NeuralConfig,
    pub power: PowerConfig,
    pub session: SessionConfig,
}

impl BenchmarkConfig {
    /// Create a new benchmark configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Small parameters that finish in well under a second per subsystem
    pub fn quick() -> Self {
        Self {
            cpu: CpuConfig {
                fibonacci_depth: 20,
                single_core_iterations: 3,
                multi_core_calculations: 4,
            },
            gpu: GpuConfig {
                matrix_size: 16,
                matrix_iterations: 2,
                vector_size: 64,
                vector_iterations: 10,
                image_size: 8,
                conv_iterations: 2,
                custom_iterations: 10,
            },
            ram: RamConfig {
                memory_mb: 4,
                iterations: 4,
            },
            ssd: SsdConfig {
                file_sizes_kb: vec![4, 64],
                large_file_mb: 2,
                ..SsdConfig::default()
            },
            neural: NeuralConfig {
                input_size: 8,
                hidden_size: 16,
                classes: 4,
                inference_iterations: 10,
                training_samples: 32,
                epochs: 2,
                learning_rate: 0.05,
                batch_size: 8,
            },
            ..Self::default()
        }
    }

    /// Swap in the [`quick`](Self::quick) workload sizes, keeping power,
    /// session and scratch-directory settings
    pub fn into_quick(self) -> Self {
        let quick = Self::quick();
        Self {
            ssd: SsdConfig {
                scratch_dir: self.ssd.scratch_dir,
                keep_temp_files: self.ssd.keep_temp_files,
                ..quick.ssd
            },
            power: self.power,
            session: self.session,
            ..quick
        }
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.cpu.fibonacci_depth == 0 {
            return Err(config_error("Fibonacci depth must be greater than 0"));
        }

        // fib(50) already takes minutes; anything past this never finishes
        const MAX_FIBONACCI_DEPTH: u32 = 50;
        if self.cpu.fibonacci_depth > MAX_FIBONACCI_DEPTH {
            return Err(SysmarkError::Config(format!(
                "Fibonacci depth too large: {} (max: {})",
                self.cpu.fibonacci_depth, MAX_FIBONACCI_DEPTH
            )));
        }

        if self.cpu.single_core_iterations == 0 {
            return Err(config_error("Single-core iterations must be greater than 0"));
        }

        let gpu = &self.gpu;
        for (name, value) in [
            ("Matrix size", gpu.matrix_size),
            ("Matrix iterations", gpu.matrix_iterations),
            ("Vector size", gpu.vector_size),
            ("Vector iterations", gpu.vector_iterations),
            ("Image size", gpu.image_size),
            ("Convolution iterations", gpu.conv_iterations),
            ("Custom operation iterations", gpu.custom_iterations),
        ] {
            if value == 0 {
                return Err(SysmarkError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.ram.iterations == 0 {
            return Err(config_error("RAM iterations must be greater than 0"));
        }

        if self.ram.memory_mb < self.ram.iterations {
            return Err(SysmarkError::Config(format!(
                "RAM size ({} MiB) must be at least one MiB per iteration ({})",
                self.ram.memory_mb, self.ram.iterations
            )));
        }

        if self.ssd.file_sizes_kb.iter().any(|&kb| kb == 0) {
            return Err(config_error("SSD file sizes must be greater than 0"));
        }

        if self.ssd.large_file_mb == 0 {
            return Err(config_error("SSD large file size must be greater than 0"));
        }

        // File size should be reasonable (not exceed 100 GiB)
        const MAX_FILE_MB: u64 = 100 * 1024;
        if self.ssd.large_file_mb > MAX_FILE_MB
            || self.ssd.file_sizes_kb.iter().any(|&kb| kb / 1024 > MAX_FILE_MB)
        {
            return Err(SysmarkError::Config(format!(
                "SSD file size too large (max: {} MiB)",
                MAX_FILE_MB
            )));
        }

        if self.ssd.scratch_dir.exists() && !self.ssd.scratch_dir.is_dir() {
            return Err(SysmarkError::Config(format!(
                "Scratch path is not a directory: {}",
                self.ssd.scratch_dir.display()
            )));
        }

        let neural = &self.neural;
        for (name, value) in [
            ("Input size", neural.input_size),
            ("Hidden size", neural.hidden_size),
            ("Inference iterations", neural.inference_iterations),
            ("Training samples", neural.training_samples),
            ("Epochs", neural.epochs),
            ("Batch size", neural.batch_size),
        ] {
            if value == 0 {
                return Err(SysmarkError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if neural.classes < 2 {
            return Err(config_error("Neural network needs at least 2 classes"));
        }

        if !(neural.learning_rate > 0.0 && neural.learning_rate.is_finite()) {
            return Err(config_error("Learning rate must be a positive number"));
        }

        if self.power.enabled && self.power.command.trim().is_empty() {
            return Err(config_error("Power command must not be empty when enabled"));
        }

        Ok(())
    }

    /// Set the CPU workload parameters
    pub fn with_cpu(mut self, cpu: CpuConfig) -> Self {
        self.cpu = cpu;
        self
    }

    /// Set the tensor kernel parameters
    pub fn with_gpu(mut self, gpu: GpuConfig) -> Self {
        self.gpu = gpu;
        self
    }

    /// Set the RAM workload parameters
    pub fn with_ram(mut self, ram: RamConfig) -> Self {
        self.ram = ram;
        self
    }

    /// Set the SSD workload parameters
    pub fn with_ssd(mut self, ssd: SsdConfig) -> Self {
        self.ssd = ssd;
        self
    }

    /// Set the neural network parameters
    pub fn with_neural(mut self, neural: NeuralConfig) -> Self {
        self.neural = neural;
        self
    }

    /// Set the power measurement settings
    pub fn with_power(mut self, power: PowerConfig) -> Self {
        self.power = power;
        self
    }

    /// Set the directory the SSD scratch directory is created in
    pub fn with_scratch_dir(mut self, path: PathBuf) -> Self {
        self.ssd.scratch_dir = path;
        self
    }

    /// Set whether to keep temporary files
    pub fn with_keep_temp_files(mut self, keep: bool) -> Self {
        self.ssd.keep_temp_files = keep;
        self
    }

    /// Set whether completed results are saved to history
    pub fn with_save_results(mut self, save: bool) -> Self {
        self.session.save_results = save;
        self
    }

    /// Load configuration from the standard config file location
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load configuration from `path`, defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            SysmarkError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            SysmarkError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the standard config file location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SysmarkError::Config(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(path, content).map_err(|e| {
            SysmarkError::Config(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/sysmark/sysmark.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| config_error("Unable to determine config directory"))?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

fn config_error(message: &str) -> SysmarkError {
    SysmarkError::Config(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        assert!(BenchmarkConfig::default().validate().is_ok());
        assert!(BenchmarkConfig::quick().validate().is_ok());
        assert!(!BenchmarkConfig::default().power.enabled);
        assert!(BenchmarkConfig::default().session.save_results);
    }

    #[test]
    fn test_into_quick_keeps_environment() {
        let config = BenchmarkConfig::default()
            .with_scratch_dir(PathBuf::from("/data/scratch"))
            .with_keep_temp_files(true)
            .with_save_results(false);
        let quick = config.into_quick();

        assert_eq!(quick.cpu, BenchmarkConfig::quick().cpu);
        assert_eq!(quick.ssd.file_sizes_kb, BenchmarkConfig::quick().ssd.file_sizes_kb);
        assert_eq!(quick.ssd.scratch_dir, PathBuf::from("/data/scratch"));
        assert!(quick.ssd.keep_temp_files);
        assert!(!quick.session.save_results);
        assert!(quick.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = BenchmarkConfig::default();
        config.cpu.fibonacci_depth = 0;
        assert!(matches!(config.validate(), Err(SysmarkError::Config(_))));

        let mut config = BenchmarkConfig::default();
        config.cpu.fibonacci_depth = 60;
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.gpu.conv_iterations = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Convolution iterations"));

        let mut config = BenchmarkConfig::default();
        config.ram.memory_mb = 2;
        config.ram.iterations = 4;
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.ssd.file_sizes_kb.push(0);
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.neural.classes = 1;
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.neural.learning_rate = f32::NAN;
        assert!(config.validate().is_err());

        let config = BenchmarkConfig::default().with_power(PowerConfig {
            enabled: true,
            command: " ".to_string(),
            sample_ms: 100,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multi_core_zero_is_valid() {
        let mut config = BenchmarkConfig::default();
        config.cpu.multi_core_calculations = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = BenchmarkConfig::new()
            .with_scratch_dir(PathBuf::from("/tmp"))
            .with_keep_temp_files(true)
            .with_save_results(false)
            .with_ram(RamConfig {
                memory_mb: 8,
                iterations: 2,
            });

        assert_eq!(config.ssd.scratch_dir, PathBuf::from("/tmp"));
        assert!(config.ssd.keep_temp_files);
        assert!(!config.session.save_results);
        assert_eq!(config.ram.memory_mb, 8);
    }

    #[test]
    fn test_toml_serialization() {
        let config = BenchmarkConfig::quick().with_keep_temp_files(true);
        let toml_str = toml::to_string(&config).expect("Failed to serialize to TOML");
        let deserialized: BenchmarkConfig =
            toml::from_str(&toml_str).expect("Failed to deserialize from TOML");

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BenchmarkConfig = toml::from_str("[cpu]\nfibonacci_depth = 25\n").unwrap();
        assert_eq!(config.cpu.fibonacci_depth, 25);
        assert_eq!(config.cpu.single_core_iterations, 10);
        assert_eq!(config.ram, RamConfig::default());
    }

    #[test]
    fn test_save_and_load_from() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("sysmark.toml");

        let config = BenchmarkConfig::quick().with_save_results(false);
        config.save_to(&path).unwrap();
        let loaded = BenchmarkConfig::load_from(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert_eq!(
            BenchmarkConfig::load_from(&missing).unwrap(),
            BenchmarkConfig::default()
        );

        let broken = temp_dir.path().join("broken.toml");
        fs::write(&broken, "cpu = [").unwrap();
        assert!(matches!(
            BenchmarkConfig::load_from(&broken),
            Err(SysmarkError::Config(_))
        ));
    }

    #[test]
    fn test_config_file_path() {
        let path = BenchmarkConfig::config_file_path();
        assert!(path.is_ok());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("sysmark"));
        assert!(path.to_string_lossy().ends_with("sysmark.toml"));
    }
}
