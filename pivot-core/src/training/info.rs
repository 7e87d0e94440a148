use super::Metric;
use crate::record::{Record, RecordValue, Recorder};
use log::info;
use std::time::Instant;

/// State of a training run.
pub struct TrainingInfo {
    metrics: Vec<Box<dyn Metric>>,
    callbacks: Vec<Box<dyn Recorder>>,
    history: Vec<Record>,
    num_epochs: usize,
}

impl TrainingInfo {
    /// A run of `num_epochs` epochs with no metric or callback.
    pub fn new(num_epochs: usize) -> Self {
        Self {
            metrics: vec![],
            callbacks: vec![],
            history: vec![],
            num_epochs,
        }
    }

    /// Adds metrics.
    pub fn with_metrics(mut self, metrics: Vec<Box<dyn Metric>>) -> Self {
        self.add_metrics(metrics);
        self
    }

    /// Adds a callback receiving the record of every epoch.
    pub fn with_callback(mut self, callback: Box<dyn Recorder>) -> Self {
        self.callbacks.push(callback);
        self
    }

    /// Adds metrics. A metric is skipped if one with the same name is present.
    pub fn add_metrics(&mut self, metrics: Vec<Box<dyn Metric>>) {
        for metric in metrics {
            if self.metrics.iter().all(|m| m.name() != metric.name()) {
                self.metrics.push(metric);
            }
        }
    }

    /// Clears the history and resets metrics.
    pub fn initialize(&mut self) {
        self.history.clear();
        self.metrics.iter_mut().for_each(|m| m.reset());
    }

    /// Called once before the first epoch.
    pub fn on_train_begin(&mut self) {
        info!(
            "Start training: {} epochs, metrics = {:?}",
            self.num_epochs,
            self.metric_names()
        );
    }

    /// Called once after the last epoch.
    pub fn on_train_end(&mut self) {
        info!("Finished training after {} epochs", self.history.len());
    }

    /// Records of finished epochs, oldest first.
    pub fn history(&self) -> &[Record] {
        &self.history
    }

    /// The number of epochs of the run.
    pub fn num_epochs(&self) -> usize {
        self.num_epochs
    }

    /// Names of the registered metrics.
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name().to_string()).collect()
    }
}

/// State of an epoch.
pub struct EpochInfo<'a, O: ?Sized> {
    /// The run this epoch belongs to.
    pub training_info: &'a mut TrainingInfo,

    /// 1-based index of the epoch.
    pub global_epoch_idx: usize,

    /// The number of batches of the epoch.
    pub batches_per_epoch: usize,

    /// Optimizer passed to the reinforcer on every batch.
    pub optimizer: &'a mut O,

    start: Instant,
    frames: f64,
}

impl<'a, O: ?Sized> EpochInfo<'a, O> {
    /// Constructs the state of epoch `global_epoch_idx`.
    pub fn new(
        training_info: &'a mut TrainingInfo,
        global_epoch_idx: usize,
        batches_per_epoch: usize,
        optimizer: &'a mut O,
    ) -> Self {
        Self {
            training_info,
            global_epoch_idx,
            batches_per_epoch,
            optimizer,
            start: Instant::now(),
            frames: 0.0,
        }
    }

    /// Resets the metrics and the epoch timer.
    pub fn on_epoch_begin(&mut self) {
        self.training_info
            .metrics
            .iter_mut()
            .for_each(|m| m.reset());
        self.start = Instant::now();
        self.frames = 0.0;
    }

    /// State of the `batch_number`-th (0-based) batch of this epoch.
    pub fn batch_info(&self, batch_number: usize) -> BatchInfo {
        let done = (self.global_epoch_idx.saturating_sub(1)) * self.batches_per_epoch + batch_number;
        let total = self.training_info.num_epochs * self.batches_per_epoch;
        let progress = if total == 0 {
            0.0
        } else {
            (done as f64 / total as f64).clamp(0.0, 1.0)
        };

        BatchInfo {
            epoch_idx: self.global_epoch_idx,
            batch_number,
            batches_per_epoch: self.batches_per_epoch,
            progress,
            result: Record::empty(),
        }
    }

    /// Feeds the result of a batch to the metrics.
    pub fn on_batch_end(&mut self, batch_info: &BatchInfo) {
        if let Ok(frames) = batch_info.result.get_scalar("frames") {
            self.frames += frames as f64;
        }
        for metric in self.training_info.metrics.iter_mut() {
            metric.calculate(&batch_info.result);
        }
    }

    /// Computes the epoch record, stores it in the history and writes it to the callbacks.
    pub fn on_epoch_end(&mut self) -> Record {
        let epoch_time = self.start.elapsed().as_secs_f32();
        let mut record = Record::empty();
        for metric in self.training_info.metrics.iter() {
            if let Some(v) = metric.value() {
                record.insert(metric.name(), RecordValue::Scalar(v));
            }
        }
        record.insert("epoch_idx", RecordValue::Scalar(self.global_epoch_idx as f32));
        record.insert("epoch_time", RecordValue::Scalar(epoch_time));
        let fps = if epoch_time > 0.0 {
            self.frames as f32 / epoch_time
        } else {
            0.0
        };
        record.insert("frames_per_sec", RecordValue::Scalar(fps));

        self.training_info.history.push(record.clone());
        for callback in self.training_info.callbacks.iter_mut() {
            callback.write(record.clone());
        }
        record
    }
}

/// State of a batch.
#[derive(Debug, Clone)]
pub struct BatchInfo {
    /// 1-based index of the epoch.
    pub epoch_idx: usize,

    /// 0-based index of the batch in the epoch.
    pub batch_number: usize,

    /// The number of batches of the epoch.
    pub batches_per_epoch: usize,

    /// Fraction of the run completed before this batch, in `[0, 1]`.
    pub progress: f64,

    /// Values reported by the reinforcer.
    pub result: Record,
}
