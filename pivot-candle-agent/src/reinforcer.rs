//! Reinforcers driving DDPG and PPO training.
mod buffered_off_policy;
mod on_policy;
pub use buffered_off_policy::{
    BufferedOffPolicyIterationReinforcer, BufferedOffPolicyIterationReinforcerConfig,
};
pub use on_policy::{OnPolicyIterationReinforcer, OnPolicyIterationReinforcerConfig};
use pivot_core::training::{AveragingMetric, FramesMetric, Metric};

fn metrics_with_keys(keys: &[&str]) -> Vec<Box<dyn Metric>> {
    let mut metrics: Vec<Box<dyn Metric>> = vec![Box::new(FramesMetric::new())];
    metrics.extend(
        keys.iter()
            .map(|k| Box::new(AveragingMetric::new(*k)) as Box<dyn Metric>),
    );
    metrics
}
