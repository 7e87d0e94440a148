//! Hyperparameter schedules over training progress.
use serde::{Deserialize, Serialize};

/// A value changing with training progress in `[0, 1]`.
pub trait Schedule {
    /// The value at `progress`.
    fn value(&self, progress: f64) -> f64;
}

/// Linear interpolation from `initial_value` at progress 0 to `final_value` at progress 1.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub struct LinearSchedule {
    /// Value at the beginning of training.
    pub initial_value: f64,

    /// Value at the end of training.
    pub final_value: f64,
}

impl LinearSchedule {
    /// Constructs a linear schedule.
    pub fn new(initial_value: f64, final_value: f64) -> Self {
        Self {
            initial_value,
            final_value,
        }
    }
}

impl Schedule for LinearSchedule {
    fn value(&self, progress: f64) -> f64 {
        let progress = progress.clamp(0.0, 1.0);
        self.initial_value + (self.final_value - self.initial_value) * progress
    }
}

/// A schedule returning the same value throughout training.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub struct ConstantSchedule(pub f64);

impl Schedule for ConstantSchedule {
    fn value(&self, _progress: f64) -> f64 {
        self.0
    }
}

/// Schedules selectable from configuration files.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum ScheduleConfig {
    /// See [`LinearSchedule`].
    Linear(LinearSchedule),

    /// See [`ConstantSchedule`].
    Constant(ConstantSchedule),
}

impl Schedule for ScheduleConfig {
    fn value(&self, progress: f64) -> f64 {
        match self {
            Self::Linear(s) => s.value(progress),
            Self::Constant(s) => s.value(progress),
        }
    }
}

impl From<LinearSchedule> for ScheduleConfig {
    fn from(s: LinearSchedule) -> Self {
        Self::Linear(s)
    }
}

impl From<ConstantSchedule> for ScheduleConfig {
    fn from(s: ConstantSchedule) -> Self {
        Self::Constant(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_schedule() {
        let s = LinearSchedule::new(0.1, 0.0);
        assert_eq!(s.value(0.0), 0.1);
        assert!((s.value(0.5) - 0.05).abs() < 1e-12);
        assert_eq!(s.value(1.0), 0.0);
        assert_eq!(s.value(-1.0), 0.1);
        assert_eq!(s.value(2.0), 0.0);
    }

    #[test]
    fn test_schedule_config_yaml() -> anyhow::Result<()> {
        let s: ScheduleConfig = LinearSchedule::new(0.1, 0.0).into();
        let text = serde_yaml::to_string(&s)?;
        let s_: ScheduleConfig = serde_yaml::from_str(&text)?;
        assert_eq!(s, s_);
        assert_eq!(ScheduleConfig::from(ConstantSchedule(0.2)).value(0.7), 0.2);
        Ok(())
    }
}
