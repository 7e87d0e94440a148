//! Running statistics and observation normalization.
use anyhow::Result;
use candle_core::{Device, Tensor};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

const EPSILON: f64 = 1e-8;

/// Running mean and variance, merged batch by batch with the parallel-moments update.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RunningMeanStd {
    /// Mean.
    pub mean: Array1<f64>,

    /// Biased variance.
    pub var: Array1<f64>,

    /// Number of samples seen, starting from a small positive value.
    pub count: f64,
}

impl RunningMeanStd {
    /// Zero mean and unit variance over `dim` values.
    pub fn new(dim: usize) -> Self {
        Self {
            mean: Array1::zeros(dim),
            var: Array1::ones(dim),
            count: 1e-4,
        }
    }

    /// Merges a batch of samples, one per row.
    pub fn update(&mut self, xs: &Array2<f32>) {
        if xs.nrows() == 0 {
            return;
        }
        let xs = xs.mapv(|x| x as f64);
        let batch_count = xs.nrows() as f64;
        let batch_mean = xs.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(xs.ncols()));
        let batch_var = xs.var_axis(Axis(0), 0.0);
        self.update_from_moments(batch_mean, batch_var, batch_count);
    }

    fn update_from_moments(&mut self, batch_mean: Array1<f64>, batch_var: Array1<f64>, batch_count: f64) {
        let delta = &batch_mean - &self.mean;
        let tot_count = self.count + batch_count;

        let new_mean = &self.mean + &(&delta * (batch_count / tot_count));
        let m_a = &self.var * self.count;
        let m_b = &batch_var * batch_count;
        let m2 = m_a + m_b + &delta.mapv(|d| d * d) * (self.count * batch_count / tot_count);

        self.mean = new_mean;
        self.var = m2 / tot_count;
        self.count = tot_count;
    }

    /// `sqrt(var + 1e-8)`.
    pub fn std(&self) -> Array1<f64> {
        self.var.mapv(|v| (v + EPSILON).sqrt())
    }
}

/// Normalizes observations with running statistics: `(x - mean) / sqrt(var + 1e-8)`.
///
/// Statistics change only through [`update`](Self::update). Forward passes never
/// touch them.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct NormalizeObservations {
    stats: RunningMeanStd,
}

impl NormalizeObservations {
    /// Normalizer for observations of width `input_shape`.
    pub fn new(input_shape: usize) -> Self {
        Self {
            stats: RunningMeanStd::new(input_shape),
        }
    }

    /// Width of observations.
    pub fn input_shape(&self) -> usize {
        self.stats.mean.len()
    }

    /// Merges freshly observed observations into the statistics.
    pub fn update(&mut self, obs: &Array2<f32>) {
        self.stats.update(obs);
    }

    /// Current statistics.
    pub fn stats(&self) -> &RunningMeanStd {
        &self.stats
    }

    /// Normalizes a batch `[batch, input_shape]`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let device: &Device = xs.device();
        let dim = self.input_shape();
        let mean = self.stats.mean.iter().map(|v| *v as f32).collect::<Vec<_>>();
        let std = self.stats.std().iter().map(|v| *v as f32).collect::<Vec<_>>();
        let mean = Tensor::from_vec(mean, (1, dim), device)?;
        let std = Tensor::from_vec(std, (1, dim), device)?;
        Ok(xs.broadcast_sub(&mean)?.broadcast_div(&std)?)
    }

    /// Loads statistics from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves statistics as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_running_moments_match_batch_moments() {
        let mut stats = RunningMeanStd::new(2);
        stats.update(&array![[1.0f32, 10.0], [3.0, 10.0]]);
        stats.update(&array![[5.0f32, 10.0]]);

        // Initial count is tiny, so the stats are those of {1, 3, 5} and {10, 10, 10}.
        assert!((stats.mean[0] - 3.0).abs() < 1e-3);
        assert!((stats.var[0] - 8.0 / 3.0).abs() < 1e-3);
        assert!((stats.mean[1] - 10.0).abs() < 1e-3);
        assert!(stats.var[1] < 1e-2);
        assert!((stats.count - 3.0001).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_forward() -> Result<()> {
        let mut norm = NormalizeObservations::new(2);
        norm.update(&array![[0.0f32, 4.0], [2.0, 8.0]]);
        let xs = Tensor::new(&[[1.0f32, 6.0], [3.0, 8.0]], &Device::Cpu)?;
        let ys = norm.forward(&xs)?.to_vec2::<f32>()?;

        assert!(ys[0][0].abs() < 1e-3);
        assert!(ys[0][1].abs() < 1e-3);
        assert!((ys[1][0] - 2.0).abs() < 1e-2);
        assert!((ys[1][1] - 1.0).abs() < 1e-2);
        Ok(())
    }
}
