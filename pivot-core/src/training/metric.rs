use crate::record::Record;

/// A value computed from the results of the batches of an epoch.
pub trait Metric {
    /// Name under which the value is reported.
    fn name(&self) -> &str;

    /// Consumes the result of a batch.
    fn calculate(&mut self, batch_result: &Record);

    /// Called at the beginning of every epoch.
    fn reset(&mut self);

    /// Current value, `None` if nothing has been observed.
    fn value(&self) -> Option<f32>;
}

/// Mean return of the episodes finished during the epoch.
///
/// Batch results carry the returns as an array under `episode_rewards`.
pub struct EpisodeRewardMetric {
    name: String,
    sum: f64,
    count: usize,
}

impl EpisodeRewardMetric {
    /// Constructs the metric reported as `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sum: 0.0,
            count: 0,
        }
    }
}

impl Metric for EpisodeRewardMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate(&mut self, batch_result: &Record) {
        if let Ok(rewards) = batch_result.get_array1("episode_rewards") {
            self.sum += rewards.iter().map(|r| *r as f64).sum::<f64>();
            self.count += rewards.len();
        }
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    fn value(&self) -> Option<f32> {
        match self.count {
            0 => None,
            n => Some((self.sum / n as f64) as f32),
        }
    }
}

/// Mean of a scalar key over the batches of the epoch that reported it.
pub struct AveragingMetric {
    name: String,
    sum: f64,
    count: usize,
}

impl AveragingMetric {
    /// Averages the scalar stored under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sum: 0.0,
            count: 0,
        }
    }
}

impl Metric for AveragingMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate(&mut self, batch_result: &Record) {
        if let Ok(v) = batch_result.get_scalar(&self.name) {
            self.sum += v as f64;
            self.count += 1;
        }
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    fn value(&self) -> Option<f32> {
        match self.count {
            0 => None,
            n => Some((self.sum / n as f64) as f32),
        }
    }
}

/// Total number of environment frames since the beginning of training.
///
/// Sums the `frames` key. Not reset between epochs.
#[derive(Default)]
pub struct FramesMetric {
    total: f64,
}

impl FramesMetric {
    /// Constructs the metric.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for FramesMetric {
    fn name(&self) -> &str {
        "frames"
    }

    fn calculate(&mut self, batch_result: &Record) {
        if let Ok(v) = batch_result.get_scalar("frames") {
            self.total += v as f64;
        }
    }

    fn reset(&mut self) {}

    fn value(&self) -> Option<f32> {
        Some(self.total as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordValue;

    #[test]
    fn test_episode_reward_metric() {
        let mut metric = EpisodeRewardMetric::new("episode_rewards");
        metric.calculate(&Record::empty());
        assert_eq!(metric.value(), None);

        let mut r = Record::empty();
        r.insert("episode_rewards", RecordValue::Array1(vec![1.0, 2.0]));
        metric.calculate(&r);
        r.insert("episode_rewards", RecordValue::Array1(vec![6.0]));
        metric.calculate(&r);
        assert_eq!(metric.value(), Some(3.0));

        metric.reset();
        assert_eq!(metric.value(), None);
    }

    #[test]
    fn test_averaging_and_frames() {
        let mut loss = AveragingMetric::new("value_loss");
        let mut frames = FramesMetric::new();
        for (l, f) in [(1.0, 2.0), (3.0, 2.0)] {
            let r = Record::from_slice(&[
                ("value_loss", RecordValue::Scalar(l)),
                ("frames", RecordValue::Scalar(f)),
            ]);
            loss.calculate(&r);
            frames.calculate(&r);
        }
        assert_eq!(loss.value(), Some(2.0));

        frames.reset();
        loss.reset();
        assert_eq!(frames.value(), Some(4.0));
        assert_eq!(loss.value(), None);
    }
}
