use super::metrics_with_keys;
use crate::{
    model::StochasticPolicyModel,
    opt::LayeredOptimizer,
    ppo::PpoPolicyGradient,
    roller::StepEnvRoller,
};
use anyhow::Result;
use log::trace;
use pivot_core::{
    record::{mean_records, RecordValue},
    training::{BatchInfo, Metric},
    Reinforcer, VecEnv,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration of [`OnPolicyIterationReinforcer`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct OnPolicyIterationReinforcerConfig {
    /// Transitions per optimizer step.
    pub batch_size: usize,

    /// Passes over the rollout per batch.
    pub experience_replay: usize,

    /// Environment steps per rollout.
    pub number_of_steps: usize,
}

/// Alternates fixed-length rollouts with several PPO passes over them.
pub struct OnPolicyIterationReinforcer<V: VecEnv> {
    settings: OnPolicyIterationReinforcerConfig,
    model: StochasticPolicyModel,
    algo: PpoPolicyGradient,
    env_roller: StepEnvRoller<V>,
    rng: StdRng,
}

impl<V: VecEnv> OnPolicyIterationReinforcer<V> {
    /// Constructs the reinforcer. `seed` drives batch shuffling.
    pub fn new(
        settings: OnPolicyIterationReinforcerConfig,
        model: StochasticPolicyModel,
        algo: PpoPolicyGradient,
        env_roller: StepEnvRoller<V>,
        seed: u64,
    ) -> Self {
        Self {
            settings,
            model,
            algo,
            env_roller,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The trained model.
    pub fn model(&self) -> &StochasticPolicyModel {
        &self.model
    }
}

impl<V: VecEnv> Reinforcer for OnPolicyIterationReinforcer<V> {
    type Optimizer = LayeredOptimizer;

    fn metrics(&self) -> Vec<Box<dyn Metric>> {
        metrics_with_keys(PpoPolicyGradient::metric_keys())
    }

    fn train_batch(&mut self, batch_info: &mut BatchInfo, optimizer: &mut LayeredOptimizer) -> Result<()> {
        let mut traj = self
            .env_roller
            .rollout(&mut self.model, self.settings.number_of_steps)?;
        self.algo.process_rollout(&mut traj);

        let device = self.model.device().clone();
        let mut results = vec![];
        for _ in 0..self.settings.experience_replay {
            for ixs in traj.shuffled_batches(self.settings.batch_size, &mut self.rng) {
                let batch = traj.select(&ixs, &device)?;
                results.push(
                    self.algo
                        .optimizer_step(&self.model, optimizer, &batch, batch_info.progress)?,
                );
            }
        }
        trace!("{} PPO steps at progress {}", results.len(), batch_info.progress);

        batch_info.result.merge_inplace(mean_records(&traj.env_records));
        batch_info.result.merge_inplace(mean_records(&results));
        batch_info
            .result
            .insert("frames", RecordValue::Scalar(traj.frames as f32));
        batch_info
            .result
            .insert("episode_rewards", RecordValue::Array1(traj.episode_rewards));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mlp::MlpConfig, model::StochasticPolicyModelConfig, opt::LayeredAdamConfig,
        ppo::PpoConfig, testing::point_vec_env, Activation,
    };
    use candle_core::Device;
    use pivot_core::{
        schedule::LinearSchedule,
        training::{AveragingMetric, EpisodeRewardMetric, EpochInfo, TrainingInfo},
        BoxSpace,
    };

    #[test]
    fn test_train_epoch() -> Result<()> {
        let model = StochasticPolicyModelConfig {
            input_shape: 3,
            backbone: MlpConfig::new(3, vec![8, 8], Activation::Tanh),
        }
        .instantiate(&BoxSpace::uniform(2, -1.0, 1.0), &Device::Cpu)?;
        let mut optimizer = LayeredAdamConfig::default()
            .layer_groups(true)
            .lr(vec![1e-4, 1e-3, 1e-3])
            .weight_decay(vec![0.0, 0.0, 0.001])
            .build(model.layer_groups()?)?;
        let algo = PpoPolicyGradient::new(PpoConfig {
            entropy_coefficient: 0.01,
            value_coefficient: 0.5,
            max_grad_norm: 0.5,
            discount_factor: 0.99,
            gae_lambda: 0.95,
            cliprange: LinearSchedule::new(0.1, 0.0).into(),
        });
        let settings = OnPolicyIterationReinforcerConfig {
            batch_size: 4,
            experience_replay: 2,
            number_of_steps: 8,
        };
        let env_roller = StepEnvRoller::new(point_vec_env(1, 5)?, 0);
        let mut reinforcer = OnPolicyIterationReinforcer::new(settings, model, algo, env_roller, 0);

        let mut info = TrainingInfo::new(2).with_metrics(vec![
            Box::new(EpisodeRewardMetric::new("episode_rewards")),
            Box::new(AveragingMetric::new("distance")),
        ]);
        reinforcer.initialize_training(&mut info)?;
        for i in 1..=2 {
            let mut epoch = EpochInfo::new(&mut info, i, 2, &mut optimizer);
            reinforcer.train_epoch(&mut epoch)?;
        }

        let record = &info.history()[1];
        // Cumulative over both epochs: 4 batches of 8 steps.
        assert_eq!(record.get_scalar("frames")?, 32.0);
        assert!(record.get_scalar("episode_rewards")? < 0.0);
        assert!(record.get_scalar("distance")? > 0.0);
        for key in PpoPolicyGradient::metric_keys() {
            assert!(record.get(key).is_some(), "missing {}", key);
        }
        Ok(())
    }
}
