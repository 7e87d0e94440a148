//! Bookkeeping of the training loop: epochs, batches and metrics.
//!
//! A training run is `num_epochs` epochs of `batches_per_epoch` batches.
//! [`TrainingInfo`] lives for the whole run, [`EpochInfo`] for one epoch and
//! [`BatchInfo`] for one batch. A reinforcer writes its results into
//! [`BatchInfo::result`], the [`Metric`]s consume them, and at the end of an
//! epoch the metric values are condensed into one [`Record`](crate::record::Record)
//! that is kept in the history and written to every callback.
mod info;
mod metric;
pub use info::{BatchInfo, EpochInfo, TrainingInfo};
pub use metric::{AveragingMetric, EpisodeRewardMetric, FramesMetric, Metric};
