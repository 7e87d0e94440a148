#![warn(missing_docs)]
//! Core components of pivot, a library for reinforcement learning on continuous control tasks.
//!
//! This crate does not depend on any tensor backend. It provides
//!
//! * environment interfaces ([`Env`], [`VecEnv`]) and a sequential vectorized wrapper
//!   ([`DummyVecEnv`]),
//! * a circular replay buffer ([`replay_buffer::CircularReplayBuffer`]),
//! * records and recorders for streaming metrics ([`record`]),
//! * the epoch/batch bookkeeping used by training loops ([`training`]),
//! * schedules of hyperparameters ([`schedule`]),
//! * the [`Reinforcer`] interface, which drives training epoch by epoch.
pub mod error;
pub mod record;
pub mod replay_buffer;
pub mod schedule;
pub mod training;

mod base;
pub use base::{BoxSpace, EpisodeInfo, Env, ExperienceBufferBase, ReplayBufferBase, Step, VecEnv, VecStep};

mod vec_env;
pub use vec_env::DummyVecEnv;

mod reinforcer;
pub use reinforcer::Reinforcer;
