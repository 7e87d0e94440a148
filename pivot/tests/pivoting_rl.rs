use anyhow::Result;
use clap::Parser;
use pivot::{
    build_ddpg, build_ppo, ddpg_config, optimizer_config, pivoting_rl, ppo_config, run_training,
    train, Algo, Args, CheetahVecEnv, PpoSettings, BATCHES_PER_EPOCH, NUM_EPOCHS, SEED,
};
use pivot_candle_agent::ppo::PpoPolicyGradient;
use pivot_cheetah_env::{HalfCheetahConfig, STEP_RECORD_KEYS};
use pivot_core::{
    replay_buffer::CircularReplayBufferConfig,
    schedule::{LinearSchedule, ScheduleConfig},
    training::{EpisodeRewardMetric, TrainingInfo},
};
use std::process::Command;
use tempdir::TempDir;

fn cheetah() -> Result<CheetahVecEnv> {
    CheetahVecEnv::build(&HalfCheetahConfig::default(), 1, SEED as i64)
}

#[test]
fn test_args() -> Result<()> {
    let args = Args::try_parse_from(["pivoting_rl"])?;
    assert_eq!(args.gpu, 0);
    assert_eq!(args.algo.parse::<Algo>()?, Algo::Ddpg);

    let args = Args::try_parse_from(["pivoting_rl", "--gpu", "1", "--algo", "ppo"])?;
    assert_eq!(args.gpu, 1);
    assert_eq!(args.algo.parse::<Algo>()?, Algo::Ppo);
    Ok(())
}

#[test]
fn test_unknown_algo_fails_before_training() {
    let args = Args {
        gpu: 0,
        algo: "sac".to_string(),
    };
    let err = pivoting_rl(&args).err().map(|e| e.to_string());
    assert_eq!(err, Some("Unknown algo sac".to_string()));
}

#[test]
fn test_binary_exits_with_error_on_unknown_algo() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_pivoting_rl"))
        .args(["--algo", "a2c"])
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("Unknown algo a2c"));
    Ok(())
}

#[test]
fn test_hyperparameters() {
    assert_eq!(NUM_EPOCHS, 500);
    assert_eq!(BATCHES_PER_EPOCH, 1000);

    let ddpg = ddpg_config();
    assert_eq!(ddpg.model.policy_backbone.input_length, 17);
    assert_eq!(ddpg.model.value_backbone.input_length, 23);
    assert_eq!(ddpg.env_roller.replay_buffer.capacity, 1_000_000);
    assert_eq!(ddpg.env_roller.replay_buffer.initial_size, 2_000);
    assert_eq!(ddpg.reinforcer.rollout_steps, 2);
    assert_eq!(ddpg.reinforcer.training_steps, 64);
    assert_eq!(ddpg.algo.discount_factor, 0.99);
    assert_eq!(ddpg.algo.tau, 0.01);
    assert_eq!(ddpg.env_roller.action_noise.std_dev, 0.2);
    assert!(ddpg.env_roller.normalize_returns);

    let ppo = ppo_config();
    assert_eq!(ppo.model.backbone.hidden_layers, vec![64, 64]);
    assert_eq!(ppo.reinforcer.batch_size, 256);
    assert_eq!(ppo.reinforcer.experience_replay, 4);
    assert_eq!(ppo.reinforcer.number_of_steps, 128);
    assert_eq!(ppo.algo.entropy_coefficient, 0.01);
    assert_eq!(ppo.algo.value_coefficient, 0.5);
    assert_eq!(ppo.algo.max_grad_norm, 0.5);
    assert_eq!(ppo.algo.discount_factor, 0.99);
    assert_eq!(ppo.algo.gae_lambda, 0.95);
    assert_eq!(
        ppo.algo.cliprange,
        ScheduleConfig::Linear(LinearSchedule::new(0.1, 0.0))
    );

    let opt = optimizer_config();
    assert_eq!(opt.lr, vec![1.0e-4, 1.0e-3, 1.0e-3]);
    assert_eq!(opt.weight_decay, vec![0.0, 0.0, 0.001]);
    assert_eq!(opt.eps, 1.0e-4);
    assert!(opt.layer_groups);
}

#[test]
fn test_ppo_settings_yaml() -> Result<()> {
    let dir = TempDir::new("ppo_settings")?;
    let path = dir.path().join("ppo.yaml");
    let settings = ppo_config();
    settings.save(&path)?;
    assert_eq!(PpoSettings::load(&path)?, settings);
    Ok(())
}

#[test]
fn test_ppo_short_run() -> Result<()> {
    let mut settings = ppo_config();
    settings.reinforcer.number_of_steps = 16;
    settings.reinforcer.batch_size = 8;
    let device = candle_core::Device::Cpu;
    let (layer_groups, mut reinforcer) = build_ppo(cheetah()?, &device, &settings, SEED)?;
    let mut optimizer = optimizer_config().build(layer_groups)?;
    let mut training_info = TrainingInfo::new(2)
        .with_metrics(vec![Box::new(EpisodeRewardMetric::new("episode_rewards"))]);

    run_training(reinforcer.as_mut(), &mut optimizer, &mut training_info, 2, 2)?;

    let history = training_info.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].get_scalar("epoch_idx")?, 2.0);
    assert_eq!(history[1].get_scalar("frames")?, 64.0);
    assert!(history[1].get_scalar("policy_loss")?.is_finite());
    Ok(())
}

#[test]
fn test_ddpg_short_run() -> Result<()> {
    let mut settings = ddpg_config();
    settings.env_roller.replay_buffer = CircularReplayBufferConfig::default()
        .capacity(1_000)
        .initial_size(100);
    let device = candle_core::Device::Cpu;
    let (layer_groups, mut reinforcer) = build_ddpg(cheetah()?, &device, &settings, SEED)?;
    let mut optimizer = optimizer_config().build(layer_groups)?;
    let mut training_info = TrainingInfo::new(1);

    run_training(reinforcer.as_mut(), &mut optimizer, &mut training_info, 1, 3)?;

    let record = &training_info.history()[0];
    assert_eq!(record.get_scalar("frames")?, 104.0);
    assert!(record.get_scalar("value_loss")?.is_finite());
    Ok(())
}

#[test]
fn test_train_dispatches_on_algo() -> Result<()> {
    let device = candle_core::Device::Cpu;

    let ppo = train(Algo::Ppo, &device, 1, 1, false)?;
    let record = &ppo.history()[0];
    assert_eq!(record.get_scalar("frames")?, 128.0);
    for key in PpoPolicyGradient::metric_keys() {
        assert!(record.get_scalar(key).is_ok(), "missing {}", key);
    }

    // The replay buffer is filled with 2,000 frames before the first batch.
    let ddpg = train(Algo::Ddpg, &device, 1, 1, false)?;
    let record = &ddpg.history()[0];
    assert_eq!(record.get_scalar("frames")?, 2002.0);
    assert!(record.get_scalar("value_loss")?.is_finite());
    assert!(record.get("clip_fraction").is_none());

    // Two 1,000-step episodes end while the buffer is filled.
    assert!(record.get_scalar("episode_rewards")?.is_finite());
    for history in [ppo.history(), ddpg.history()] {
        for key in STEP_RECORD_KEYS {
            assert!(history[0].get_scalar(key)?.is_finite(), "missing {}", key);
        }
    }
    Ok(())
}
