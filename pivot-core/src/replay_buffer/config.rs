//! Configuration of [`CircularReplayBuffer`](super::CircularReplayBuffer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`CircularReplayBuffer`](super::CircularReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CircularReplayBufferConfig {
    /// The maximum number of transitions. The oldest ones are overwritten when full.
    pub capacity: usize,

    /// The number of transitions required before sampling starts.
    pub initial_size: usize,

    /// Seed of the sampling RNG.
    pub seed: u64,
}

impl Default for CircularReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            initial_size: 2_000,
            seed: 42,
        }
    }
}

impl CircularReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of transitions required before sampling starts.
    pub fn initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    /// Sets the seed of the sampling RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Loads [`CircularReplayBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CircularReplayBufferConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
