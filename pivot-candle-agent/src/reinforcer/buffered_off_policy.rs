use super::metrics_with_keys;
use crate::{
    ddpg::DeepDeterministicPolicyGradient,
    model::DeterministicPolicyModel,
    opt::LayeredOptimizer,
    roller::{Rollout, TransitionReplayEnvRoller},
};
use anyhow::Result;
use log::info;
use pivot_core::{
    record::{mean_records, RecordValue},
    training::{BatchInfo, Metric, TrainingInfo},
    Reinforcer, VecEnv,
};
use serde::{Deserialize, Serialize};

/// Configuration of [`BufferedOffPolicyIterationReinforcer`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct BufferedOffPolicyIterationReinforcerConfig {
    /// Environment steps per batch once the buffer is ready.
    pub rollout_steps: usize,

    /// Size of the transition sample of every optimizer step.
    pub training_steps: usize,

    /// Optimizer steps per batch.
    pub training_rounds: usize,
}

impl Default for BufferedOffPolicyIterationReinforcerConfig {
    fn default() -> Self {
        Self {
            rollout_steps: 1,
            training_steps: 64,
            training_rounds: 1,
        }
    }
}

/// Alternates short rollouts into a replay buffer with DDPG steps on samples from it.
///
/// Before the first optimization, the buffer is filled up to its initial size.
pub struct BufferedOffPolicyIterationReinforcer<V: VecEnv> {
    settings: BufferedOffPolicyIterationReinforcerConfig,
    model: DeterministicPolicyModel,
    algo: DeepDeterministicPolicyGradient,
    env_roller: TransitionReplayEnvRoller<V>,
}

impl<V: VecEnv> BufferedOffPolicyIterationReinforcer<V> {
    /// Constructs the reinforcer.
    pub fn new(
        settings: BufferedOffPolicyIterationReinforcerConfig,
        model: DeterministicPolicyModel,
        algo: DeepDeterministicPolicyGradient,
        env_roller: TransitionReplayEnvRoller<V>,
    ) -> Self {
        Self {
            settings,
            model,
            algo,
            env_roller,
        }
    }

    /// The trained model.
    pub fn model(&self) -> &DeterministicPolicyModel {
        &self.model
    }

    /// The env roller.
    pub fn env_roller(&self) -> &TransitionReplayEnvRoller<V> {
        &self.env_roller
    }
}

impl<V: VecEnv> Reinforcer for BufferedOffPolicyIterationReinforcer<V> {
    type Optimizer = LayeredOptimizer;

    fn metrics(&self) -> Vec<Box<dyn Metric>> {
        metrics_with_keys(DeepDeterministicPolicyGradient::metric_keys())
    }

    fn initialize_training(&mut self, training_info: &mut TrainingInfo) -> Result<()> {
        self.algo.initialize(&self.model)?;
        training_info.add_metrics(self.metrics());
        Ok(())
    }

    fn train_batch(&mut self, batch_info: &mut BatchInfo, optimizer: &mut LayeredOptimizer) -> Result<()> {
        let mut rollout = Rollout::default();

        if !self.env_roller.is_ready_for_sampling() {
            while !self.env_roller.is_ready_for_sampling() {
                rollout.extend(self.env_roller.rollout(&mut self.model, 1)?);
            }
            info!("Filled the replay buffer with {} frames", rollout.frames);
        } else {
            rollout.extend(
                self.env_roller
                    .rollout(&mut self.model, self.settings.rollout_steps)?,
            );
        }

        let mut results = Vec::with_capacity(self.settings.training_rounds);
        for _ in 0..self.settings.training_rounds {
            let batch = self.env_roller.sample(self.settings.training_steps)?;
            results.push(self.algo.optimizer_step(&self.model, optimizer, &batch)?);
        }

        batch_info.result.merge_inplace(mean_records(&rollout.env_records));
        batch_info.result.merge_inplace(mean_records(&results));
        batch_info
            .result
            .insert("frames", RecordValue::Scalar(rollout.frames as f32));
        batch_info
            .result
            .insert("episode_rewards", RecordValue::Array1(rollout.episode_rewards));
        Ok(())
    }
}
