//! Continuous space.
use crate::error::PivotError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A box in `R^n` given by per-dimension lower and upper bounds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BoxSpace {
    /// Lower bounds.
    pub low: Vec<f32>,

    /// Upper bounds.
    pub high: Vec<f32>,
}

impl BoxSpace {
    /// Constructs a box. `low` and `high` must have the same length.
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Result<Self, PivotError> {
        if low.len() != high.len() {
            return Err(PivotError::ShapeMismatch {
                name: "high".to_string(),
                expected: vec![low.len()],
                actual: vec![high.len()],
            });
        }
        Ok(Self { low, high })
    }

    /// A box with the same bounds in all dimensions.
    pub fn uniform(dim: usize, low: f32, high: f32) -> Self {
        Self {
            low: vec![low; dim],
            high: vec![high; dim],
        }
    }

    /// The number of dimensions.
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// Clips values into the box in place.
    pub fn clip(&self, xs: &mut [f32]) {
        for ((x, lo), hi) in xs.iter_mut().zip(&self.low).zip(&self.high) {
            *x = x.clamp(*lo, *hi);
        }
    }

    /// Returns `true` if `xs` lies in the box.
    pub fn contains(&self, xs: &[f32]) -> bool {
        xs.len() == self.dim()
            && xs
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(x, (lo, hi))| lo <= x && x <= hi)
    }

    /// Samples a point uniformly. Unbounded dimensions are not supported.
    pub fn sample(&self, rng: &mut impl Rng) -> Vec<f32> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(lo, hi)| rng.gen_range(*lo..=*hi))
            .collect()
    }
}
