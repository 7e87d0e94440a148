//! Core functionalities.
mod env;
mod replay_buffer;
mod space;
mod step;
pub use env::{Env, VecEnv};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
pub use space::BoxSpace;
pub use step::{EpisodeInfo, Step, VecStep};
