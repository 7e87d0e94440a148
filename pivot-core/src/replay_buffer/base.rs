//! Circular replay buffer.
use super::{CircularReplayBufferConfig, TransitionBatch};
use crate::{error::PivotError, ExperienceBufferBase, ReplayBufferBase};
use anyhow::Result;
use log::trace;
use ndarray::{Array2, ArrayView2};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A FIFO ring of transitions with uniform sampling.
///
/// Storage grows on demand up to `capacity`; after that the oldest
/// transitions are overwritten.
pub struct CircularReplayBuffer {
    capacity: usize,
    initial_size: usize,
    obs_dim: usize,
    act_dim: usize,
    i: usize,
    size: usize,
    obs: Vec<f32>,
    act: Vec<f32>,
    next_obs: Vec<f32>,
    reward: Vec<f32>,
    is_terminated: Vec<i8>,
    is_truncated: Vec<i8>,
    rng: StdRng,
}

impl CircularReplayBuffer {
    /// Returns `true` once the buffer holds at least `initial_size` transitions.
    pub fn is_ready_for_sampling(&self) -> bool {
        self.size >= self.initial_size
    }

    /// The maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index of the slot written next.
    pub fn position(&self) -> usize {
        self.i
    }

    fn check(name: &str, xs: &ArrayView2<f32>, n: usize, dim: usize) -> Result<()> {
        if xs.shape() != [n, dim] {
            return Err(PivotError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![n, dim],
                actual: xs.shape().to_vec(),
            }
            .into());
        }
        Ok(())
    }

    #[inline]
    fn write_row<T: Copy>(buf: &mut Vec<T>, slot: usize, row: &[T]) {
        let dim = row.len();
        if buf.len() < (slot + 1) * dim {
            buf.extend_from_slice(row);
        } else {
            buf[slot * dim..(slot + 1) * dim].copy_from_slice(row);
        }
    }

    fn gather(&self, buf: &[f32], ixs: &[usize], dim: usize) -> Result<Array2<f32>> {
        let mut out = Vec::with_capacity(ixs.len() * dim);
        for &ix in ixs {
            out.extend_from_slice(&buf[ix * dim..(ix + 1) * dim]);
        }
        Ok(Array2::from_shape_vec((ixs.len(), dim), out)?)
    }
}

impl ExperienceBufferBase for CircularReplayBuffer {
    type Item = TransitionBatch;

    /// Pushes every row of `tr`. Rows are written at the current position in order.
    fn push(&mut self, tr: TransitionBatch) -> Result<()> {
        let n = tr.len();
        Self::check("obs", &tr.obs.view(), n, self.obs_dim)?;
        Self::check("act", &tr.act.view(), n, self.act_dim)?;
        Self::check("next_obs", &tr.next_obs.view(), n, self.obs_dim)?;
        if tr.is_terminated.len() != n || tr.is_truncated.len() != n {
            return Err(PivotError::ShapeMismatch {
                name: "flags".to_string(),
                expected: vec![n],
                actual: vec![tr.is_terminated.len(), tr.is_truncated.len()],
            }
            .into());
        }

        for k in 0..n {
            let slot = self.i;
            let (obs, act, next_obs) = (tr.obs.row(k), tr.act.row(k), tr.next_obs.row(k));
            Self::write_row(&mut self.obs, slot, &obs.to_vec());
            Self::write_row(&mut self.act, slot, &act.to_vec());
            Self::write_row(&mut self.next_obs, slot, &next_obs.to_vec());
            Self::write_row(&mut self.reward, slot, &[tr.reward[k]]);
            Self::write_row(&mut self.is_terminated, slot, &[tr.is_terminated[k]]);
            Self::write_row(&mut self.is_truncated, slot, &[tr.is_truncated[k]]);

            self.i = (self.i + 1) % self.capacity;
            self.size = (self.size + 1).min(self.capacity);
        }
        trace!("Replay buffer size = {}", self.size);
        Ok(())
    }

    fn len(&self) -> usize {
        self.size
    }
}

impl ReplayBufferBase for CircularReplayBuffer {
    type Config = CircularReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config, obs_dim: usize, act_dim: usize) -> Result<Self> {
        if config.capacity == 0 {
            return Err(PivotError::InvalidConfig(
                "replay buffer capacity must be positive".to_string(),
            )
            .into());
        }
        Ok(Self {
            capacity: config.capacity,
            initial_size: config.initial_size,
            obs_dim,
            act_dim,
            i: 0,
            size: 0,
            obs: vec![],
            act: vec![],
            next_obs: vec![],
            reward: vec![],
            is_terminated: vec![],
            is_truncated: vec![],
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Samples `size` transitions uniformly with replacement.
    fn batch(&mut self, size: usize) -> Result<TransitionBatch> {
        if self.size == 0 {
            return Err(PivotError::EmptyBuffer.into());
        }
        let ixs = (0..size)
            .map(|_| self.rng.gen_range(0..self.size))
            .collect::<Vec<_>>();

        Ok(TransitionBatch {
            obs: self.gather(&self.obs, &ixs, self.obs_dim)?,
            act: self.gather(&self.act, &ixs, self.act_dim)?,
            next_obs: self.gather(&self.next_obs, &ixs, self.obs_dim)?,
            reward: ixs.iter().map(|&ix| self.reward[ix]).collect(),
            is_terminated: ixs.iter().map(|&ix| self.is_terminated[ix]).collect(),
            is_truncated: ixs.iter().map(|&ix| self.is_truncated[ix]).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transitions(start: usize, n: usize) -> TransitionBatch {
        let v = |k: usize| (start + k) as f32;
        TransitionBatch {
            obs: Array2::from_shape_fn((n, 2), |(k, _)| v(k)),
            act: Array2::from_shape_fn((n, 1), |(k, _)| -v(k)),
            next_obs: Array2::from_shape_fn((n, 2), |(k, _)| v(k) + 0.5),
            reward: (0..n).map(v).collect(),
            is_terminated: vec![0; n],
            is_truncated: vec![0; n],
        }
    }

    #[test]
    fn test_ring_overwrites_oldest() -> Result<()> {
        let config = CircularReplayBufferConfig::default()
            .capacity(4)
            .initial_size(3);
        let mut buffer = CircularReplayBuffer::build(&config, 2, 1)?;
        assert!(buffer.is_empty());

        buffer.push(transitions(0, 2))?;
        assert!(!buffer.is_ready_for_sampling());
        buffer.push(transitions(2, 3))?;
        assert!(buffer.is_ready_for_sampling());
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.position(), 1);

        // Transition 0 was overwritten by transition 4.
        let batch = buffer.batch(200)?;
        assert!(batch.reward.iter().all(|r| *r >= 1.0 && *r <= 4.0));
        assert!(batch.reward.iter().any(|r| *r == 4.0));
        for k in 0..batch.len() {
            assert_eq!(batch.obs[[k, 0]], batch.reward[k]);
            assert_eq!(batch.act[[k, 0]], -batch.reward[k]);
            assert_eq!(batch.next_obs[[k, 1]], batch.reward[k] + 0.5);
        }
        Ok(())
    }

    #[test]
    fn test_empty_and_shape_errors() -> Result<()> {
        let config = CircularReplayBufferConfig::default().capacity(4);
        let mut buffer = CircularReplayBuffer::build(&config, 3, 1)?;
        assert!(buffer.batch(1).is_err());
        assert!(buffer.push(transitions(0, 1)).is_err());
        assert_eq!(buffer.len(), 0);
        Ok(())
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let config = CircularReplayBufferConfig::default().capacity(0);
        let err = CircularReplayBuffer::build(&config, 3, 1)
            .err()
            .and_then(|e| e.downcast::<PivotError>().ok());
        assert_eq!(
            err,
            Some(PivotError::InvalidConfig(
                "replay buffer capacity must be positive".to_string()
            ))
        );
    }

    #[test]
    fn test_sampling_is_seeded() -> Result<()> {
        let config = CircularReplayBufferConfig::default().capacity(10).seed(3);
        let mut b1 = CircularReplayBuffer::build(&config, 2, 1)?;
        let mut b2 = CircularReplayBuffer::build(&config, 2, 1)?;
        b1.push(transitions(0, 10))?;
        b2.push(transitions(0, 10))?;
        assert_eq!(b1.batch(16)?, b2.batch(16)?);
        Ok(())
    }
}
