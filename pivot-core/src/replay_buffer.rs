//! Circular replay buffer of transitions.
mod base;
mod batch;
mod config;
pub use base::CircularReplayBuffer;
pub use batch::TransitionBatch;
pub use config::CircularReplayBufferConfig;
