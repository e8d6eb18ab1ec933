//! Power measurement collaborator
//!
//! Readings are best effort. `0.0` means "unavailable" and is a valid value
//! everywhere; a meter never returns an error.

use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::debug;

use crate::config::PowerConfig;

/// Source of wattage readings taken before/after a workload
pub trait PowerMeter: Send + Sync {
    fn measure_wattage(&self) -> f64;
}

/// Meter that always reports "unavailable"
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMeter;

impl PowerMeter for NullMeter {
    fn measure_wattage(&self) -> f64 {
        0.0
    }
}

/// Meter returning a fixed reading
#[derive(Debug, Clone, Copy)]
pub struct FixedMeter(pub f64);

impl PowerMeter for FixedMeter {
    fn measure_wattage(&self) -> f64 {
        self.0
    }
}

/// Samples power once through the macOS `powermetrics` tool
#[derive(Debug, Clone)]
pub struct PowermetricsMeter {
    command: String,
    sample_ms: u64,
}

impl PowermetricsMeter {
    pub fn new(command: impl Into<String>, sample_ms: u64) -> Self {
        Self {
            command: command.into(),
            sample_ms,
        }
    }
}

impl PowerMeter for PowermetricsMeter {
    fn measure_wattage(&self) -> f64 {
        let output = Command::new(&self.command)
            .args(["--samplers", "cpu_power", "-i"])
            .arg(self.sample_ms.to_string())
            .args(["-n", "1"])
            .stdin(Stdio::null())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                debug!(command = %self.command, error = %e, "power meter unavailable");
                return 0.0;
            }
        };

        if !output.status.success() {
            debug!(
                command = %self.command,
                status = %output.status,
                "power meter exited with failure"
            );
            return 0.0;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_average_power(&stdout) {
            Some(watts) => {
                debug!(watts, "measured wattage");
                watts
            }
            None => {
                debug!("no power line in powermetrics output");
                0.0
            }
        }
    }
}

/// Extract the last power reading in watts from powermetrics output
///
/// Looks at lines containing `Average Power` or `Combined Power`, takes the
/// number after the colon and converts `mW` to watts.
pub fn parse_average_power(output: &str) -> Option<f64> {
    let mut watts = None;

    for line in output.lines() {
        if !(line.contains("Average Power") || line.contains("Combined Power")) {
            continue;
        }
        let Some((_, value)) = line.split_once(':') else {
            continue;
        };
        let mut parts = value.split_whitespace();
        let Some(number) = parts.next().and_then(|n| n.parse::<f64>().ok()) else {
            continue;
        };
        let reading = match parts.next() {
            Some(unit) if unit.eq_ignore_ascii_case("mw") => number / 1000.0,
            _ => number,
        };
        watts = Some(reading);
    }

    watts
}

/// Build the meter selected by the configuration
pub fn meter_from_config(config: &PowerConfig) -> Arc<dyn PowerMeter> {
    if config.enabled {
        Arc::new(PowermetricsMeter::new(config.command.clone(), config.sample_ms))
    } else {
        Arc::new(NullMeter)
    }
}
