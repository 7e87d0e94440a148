#![warn(missing_docs)]
//! A planar half-cheetah running task written in plain Rust.
//!
//! The body is a torso with two three-segment legs. The torso moves in the
//! x-z plane and rotates about the y axis. Each leg has thigh, shin and foot
//! hinges driven by torque actuators. The ground pushes back on the tips of
//! the shins and feet and on both ends of the torso.
//!
//! ```no_run
//! use pivot_cheetah_env::{HalfCheetahConfig, HalfCheetahEnv};
//! use pivot_core::{DummyVecEnv, VecEnv};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = HalfCheetahConfig::default();
//! let mut env = DummyVecEnv::<HalfCheetahEnv>::build(&config, 1, 1002)?;
//! let obs = env.reset()?;
//! assert_eq!(obs.shape(), &[1, 17]);
//! # Ok(())
//! # }
//! ```
mod body;
mod config;
mod env;
pub use config::HalfCheetahConfig;
pub use env::{HalfCheetahEnv, STEP_RECORD_KEYS};
