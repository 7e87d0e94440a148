//! Reinforcer, the object driving training of a model.
use crate::training::{BatchInfo, EpochInfo, Metric, TrainingInfo};
use anyhow::Result;
use log::trace;

/// Trains a model by interleaving environment interaction with optimization.
///
/// Implementors provide [`train_batch`](Reinforcer::train_batch). The provided
/// [`train_epoch`](Reinforcer::train_epoch) runs `batches_per_epoch` batches and
/// closes the epoch. The trait is object safe; a training loop can hold any
/// reinforcer as `Box<dyn Reinforcer<Optimizer = O>>`.
pub trait Reinforcer {
    /// Optimizer of the trained model.
    type Optimizer: ?Sized;

    /// Metrics computed from the batch results of this reinforcer.
    fn metrics(&self) -> Vec<Box<dyn Metric>>;

    /// Prepares the reinforcer for training and registers its metrics.
    fn initialize_training(&mut self, training_info: &mut TrainingInfo) -> Result<()> {
        training_info.add_metrics(self.metrics());
        Ok(())
    }

    /// Runs a single batch. Results go to `batch_info.result`.
    fn train_batch(&mut self, batch_info: &mut BatchInfo, optimizer: &mut Self::Optimizer)
        -> Result<()>;

    /// Runs an epoch.
    fn train_epoch(&mut self, epoch_info: &mut EpochInfo<'_, Self::Optimizer>) -> Result<()> {
        epoch_info.on_epoch_begin();
        for batch_number in 0..epoch_info.batches_per_epoch {
            let mut batch_info = epoch_info.batch_info(batch_number);
            self.train_batch(&mut batch_info, epoch_info.optimizer)?;
            epoch_info.on_batch_end(&batch_info);
            trace!(
                "Epoch {} batch {} done",
                epoch_info.global_epoch_idx,
                batch_number
            );
        }
        epoch_info.on_epoch_end();
        Ok(())
    }
}
