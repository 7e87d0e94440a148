//! Training of DDPG and PPO agents on the planar half-cheetah.
//!
//! The workspace consists of the following crates:
//!
//! * [pivot-core](pivot_core) provides environment interfaces, the replay buffer,
//!   records, metrics and the [`Reinforcer`] trait driving training epoch by epoch.
//! * [pivot-candle-agent](pivot_candle_agent) implements models, DDPG, PPO and the
//!   reinforcers with [candle](https://crates.io/crates/candle-core).
//! * [pivot-cheetah-env](pivot_cheetah_env) is the half-cheetah environment.
//! * This crate wires them together. The `pivoting_rl` binary is a thin CLI over
//!   [`pivoting_rl`].
use anyhow::Result;
use candle_core::Var;
use clap::Parser;
use log::info;
use pivot_candle_agent::{
    ddpg::{DdpgConfig, DeepDeterministicPolicyGradient},
    mlp::MlpConfig,
    model::{DeterministicPolicyModelConfig, StochasticPolicyModelConfig},
    noise::OuNoiseConfig,
    opt::{LayeredAdamConfig, LayeredOptimizer},
    ppo::{PpoConfig, PpoPolicyGradient},
    reinforcer::{
        BufferedOffPolicyIterationReinforcer, BufferedOffPolicyIterationReinforcerConfig,
        OnPolicyIterationReinforcer, OnPolicyIterationReinforcerConfig,
    },
    roller::{StepEnvRoller, TransitionReplayEnvRoller, TransitionReplayEnvRollerConfig},
    Activation, Device,
};
use pivot_cheetah_env::{HalfCheetahConfig, HalfCheetahEnv, STEP_RECORD_KEYS};
use pivot_core::{
    error::PivotError,
    record::StdoutRecorder,
    replay_buffer::CircularReplayBufferConfig,
    schedule::LinearSchedule,
    training::{AveragingMetric, EpisodeRewardMetric, EpochInfo, Metric, TrainingInfo},
    DummyVecEnv, Reinforcer, VecEnv,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    str::FromStr,
};

/// The number of epochs, one per 2,000 frames of a million.
pub const NUM_EPOCHS: usize = (1.0e6 / 2.0 / 1000.0) as usize;

/// The number of batches of an epoch.
pub const BATCHES_PER_EPOCH: usize = 1000;

/// Seed of the environments, the models and the rollers.
pub const SEED: u64 = 1002;

/// The number of environments stepped in parallel.
pub const PARALLEL_ENVS: usize = 1;

const OBS_DIM: usize = 17;
const ACT_DIM: usize = 6;

/// A reinforcer training a model with a [`LayeredOptimizer`].
pub type BoxedReinforcer = Box<dyn Reinforcer<Optimizer = LayeredOptimizer>>;

/// Environment the agents are trained on.
pub type CheetahVecEnv = DummyVecEnv<HalfCheetahEnv>;

/// RL algorithm selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algo {
    /// Deep deterministic policy gradient.
    Ddpg,

    /// Proximal policy optimization.
    Ppo,
}

impl FromStr for Algo {
    type Err = PivotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ddpg" => Ok(Self::Ddpg),
            "ppo" => Ok(Self::Ppo),
            _ => Err(PivotError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Train DDPG or PPO on HalfCheetah-v2
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Index of the CUDA device, the CPU is used when CUDA is unavailable
    #[arg(long, default_value_t = 0)]
    pub gpu: usize,

    /// RL algorithm, ddpg or ppo
    #[arg(long, default_value = "ddpg")]
    pub algo: String,
}

/// Everything needed to build the DDPG reinforcer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DdpgSettings {
    /// Model.
    pub model: DeterministicPolicyModelConfig,

    /// Algorithm.
    pub algo: DdpgConfig,

    /// Env roller with its replay buffer and action noise.
    pub env_roller: TransitionReplayEnvRollerConfig,

    /// Reinforcer.
    pub reinforcer: BufferedOffPolicyIterationReinforcerConfig,
}

/// Everything needed to build the PPO reinforcer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PpoSettings {
    /// Model.
    pub model: StochasticPolicyModelConfig,

    /// Algorithm.
    pub algo: PpoConfig,

    /// Reinforcer.
    pub reinforcer: OnPolicyIterationReinforcerConfig,
}

macro_rules! impl_yaml_io {
    ($t:ty) => {
        impl $t {
            /// Loads the settings from YAML file.
            pub fn load(path: impl AsRef<Path>) -> Result<Self> {
                let file = File::open(path)?;
                let rdr = BufReader::new(file);
                let b = serde_yaml::from_reader(rdr)?;
                Ok(b)
            }

            /// Saves the settings as YAML file.
            pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
                let mut file = File::create(path)?;
                file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
                Ok(())
            }
        }
    };
}

impl_yaml_io!(DdpgSettings);
impl_yaml_io!(PpoSettings);

/// DDPG hyperparameters.
pub fn ddpg_config() -> DdpgSettings {
    DdpgSettings {
        model: DeterministicPolicyModelConfig {
            input_shape: OBS_DIM,
            policy_backbone: MlpConfig::new(OBS_DIM, vec![64, 64], Activation::Tanh),
            value_backbone: MlpConfig::new(OBS_DIM + ACT_DIM, vec![64, 64], Activation::Tanh),
        },
        algo: DdpgConfig::default().discount_factor(0.99).tau(0.01),
        env_roller: TransitionReplayEnvRollerConfig {
            replay_buffer: CircularReplayBufferConfig::default()
                .capacity(1_000_000)
                .initial_size(2_000),
            action_noise: OuNoiseConfig::default().std_dev(0.2),
            normalize_returns: true,
            discount_factor: 0.99,
        },
        reinforcer: BufferedOffPolicyIterationReinforcerConfig {
            rollout_steps: 2,
            training_steps: 64,
            training_rounds: 1,
        },
    }
}

/// PPO hyperparameters.
pub fn ppo_config() -> PpoSettings {
    PpoSettings {
        model: StochasticPolicyModelConfig {
            input_shape: OBS_DIM,
            backbone: MlpConfig::new(OBS_DIM, vec![64, 64], Activation::Tanh),
        },
        algo: PpoConfig {
            entropy_coefficient: 0.01,
            value_coefficient: 0.5,
            max_grad_norm: 0.5,
            discount_factor: 0.99,
            gae_lambda: 0.95,
            cliprange: LinearSchedule::new(0.1, 0.0).into(),
        },
        reinforcer: OnPolicyIterationReinforcerConfig {
            batch_size: 256,
            experience_replay: 4,
            number_of_steps: 128,
        },
    }
}

/// Layered Adam shared by both algorithms.
pub fn optimizer_config() -> LayeredAdamConfig {
    LayeredAdamConfig::default()
        .lr(vec![1.0e-4, 1.0e-3, 1.0e-3])
        .weight_decay(vec![0.0, 0.0, 0.001])
        .eps(1.0e-4)
        .layer_groups(true)
}

/// Builds the DDPG reinforcer from `settings`.
pub fn build_ddpg<V: VecEnv + 'static>(
    vec_env: V,
    device: &candle_core::Device,
    settings: &DdpgSettings,
    seed: u64,
) -> Result<(Vec<Vec<Var>>, BoxedReinforcer)> {
    let model = settings.model.instantiate(vec_env.action_space(), device)?;
    let layer_groups = model.layer_groups()?;
    let env_roller = TransitionReplayEnvRoller::build(&settings.env_roller, vec_env, seed)?;
    let reinforcer = BufferedOffPolicyIterationReinforcer::new(
        settings.reinforcer.clone(),
        model,
        DeepDeterministicPolicyGradient::new(settings.algo.clone()),
        env_roller,
    );
    Ok((layer_groups, Box::new(reinforcer)))
}

/// Builds the PPO reinforcer from `settings`.
pub fn build_ppo<V: VecEnv + 'static>(
    vec_env: V,
    device: &candle_core::Device,
    settings: &PpoSettings,
    seed: u64,
) -> Result<(Vec<Vec<Var>>, BoxedReinforcer)> {
    let model = settings.model.instantiate(vec_env.action_space(), device)?;
    let layer_groups = model.layer_groups()?;
    let env_roller = StepEnvRoller::new(vec_env, seed);
    let reinforcer = OnPolicyIterationReinforcer::new(
        settings.reinforcer.clone(),
        model,
        PpoPolicyGradient::new(settings.algo.clone()),
        env_roller,
        seed,
    );
    Ok((layer_groups, Box::new(reinforcer)))
}

/// The DDPG reinforcer with the hyperparameters of [`ddpg_config`].
pub fn get_ddpg<V: VecEnv + 'static>(
    vec_env: V,
    device: &candle_core::Device,
) -> Result<(Vec<Vec<Var>>, BoxedReinforcer)> {
    build_ddpg(vec_env, device, &ddpg_config(), SEED)
}

/// The PPO reinforcer with the hyperparameters of [`ppo_config`].
pub fn get_ppo<V: VecEnv + 'static>(
    vec_env: V,
    device: &candle_core::Device,
) -> Result<(Vec<Vec<Var>>, BoxedReinforcer)> {
    build_ppo(vec_env, device, &ppo_config(), SEED)
}

/// Runs `num_epochs` epochs of `batches_per_epoch` batches.
pub fn run_training(
    reinforcer: &mut dyn Reinforcer<Optimizer = LayeredOptimizer>,
    optimizer: &mut LayeredOptimizer,
    training_info: &mut TrainingInfo,
    num_epochs: usize,
    batches_per_epoch: usize,
) -> Result<()> {
    training_info.initialize();
    reinforcer.initialize_training(training_info)?;
    training_info.on_train_begin();

    for i in 1..=num_epochs {
        let mut epoch_info =
            EpochInfo::new(&mut *training_info, i, batches_per_epoch, &mut *optimizer);
        reinforcer.train_epoch(&mut epoch_info)?;
    }

    training_info.on_train_end();
    Ok(())
}

/// Builds the environment, the reinforcer of `algo` and its optimizer, then trains.
///
/// Returns the training info holding the record of every epoch. Besides the
/// metrics of the reinforcer, epoch records hold the mean episode reward and
/// the means of the reward components and the forward velocity of the cheetah.
pub fn train(
    algo: Algo,
    device: &candle_core::Device,
    num_epochs: usize,
    batches_per_epoch: usize,
    with_stdout: bool,
) -> Result<TrainingInfo> {
    let vec_env = CheetahVecEnv::build(&HalfCheetahConfig::default(), PARALLEL_ENVS, SEED as i64)?;
    let (layer_groups, mut reinforcer) = match algo {
        Algo::Ddpg => get_ddpg(vec_env, device)?,
        Algo::Ppo => get_ppo(vec_env, device)?,
    };
    let mut optimizer = optimizer_config().build(layer_groups)?;

    let mut metrics: Vec<Box<dyn Metric>> = vec![Box::new(EpisodeRewardMetric::new("episode_rewards"))];
    metrics.extend(
        STEP_RECORD_KEYS
            .iter()
            .map(|key| Box::new(AveragingMetric::new(*key)) as Box<dyn Metric>),
    );
    let mut training_info = TrainingInfo::new(num_epochs).with_metrics(metrics);
    if with_stdout {
        training_info = training_info.with_callback(Box::new(StdoutRecorder::new()));
    }

    run_training(
        reinforcer.as_mut(),
        &mut optimizer,
        &mut training_info,
        num_epochs,
        batches_per_epoch,
    )?;
    Ok(training_info)
}

/// Entry point of the `pivoting_rl` binary.
///
/// The algorithm is validated before anything is built.
pub fn pivoting_rl(args: &Args) -> Result<()> {
    let algo = args.algo.parse::<Algo>()?;
    let device = Device::Cuda(args.gpu).build()?;
    info!("Train {:?} on {:?} with seed {}", algo, device, SEED);
    train(algo, &device, NUM_EPOCHS, BATCHES_PER_EPOCH, true)?;
    Ok(())
}
