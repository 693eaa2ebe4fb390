use serde::{Deserialize, Serialize};

/// Internal grain temperature samples from the trailing sensor window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorWindow {
    pub samples: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl SensorWindow {
    pub fn new(samples: Vec<f64>) -> Self {
        Self { samples }
    }

    /// Returns `None` when there are no samples.
    pub fn stats(&self) -> Option<SensorStats> {
        if self.samples.is_empty() {
            return None;
        }

        let min = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self
            .samples
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let avg = self.samples.iter().sum::<f64>() / self.samples.len() as f64;

        Some(SensorStats { min, max, avg })
    }
}
