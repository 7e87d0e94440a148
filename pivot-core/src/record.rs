//! Records of values produced during training and the recorders consuming them.
//!
//! A [`Record`] maps string keys to [`RecordValue`]s. Reinforcers fill a record per
//! batch, [`EpochInfo`](crate::training::EpochInfo) condenses them into one record
//! per epoch and writes it to the [`Recorder`]s of the run.
//!
//! ```rust
//! use pivot_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("policy_loss", 0.25);
//! record.insert("episode_rewards", RecordValue::Array1(vec![-1.0, 3.0]));
//! assert_eq!(record.get_scalar("policy_loss").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod recorder;
mod stdout_recorder;

pub use base::{mean_records, Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use recorder::Recorder;
pub use stdout_recorder::StdoutRecorder;
