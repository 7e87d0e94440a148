use super::{deterministic::check_input, save_files};
use crate::{
    distribution,
    mlp::{Mlp, MlpConfig},
    normalize::NormalizeObservations,
    util::vars_with_prefix,
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, Var, D};
use candle_nn::{linear, Init, Linear, Module, VarBuilder, VarMap};
use log::info;
use pivot_core::BoxSpace;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`StochasticPolicyModel`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct StochasticPolicyModelConfig {
    /// Width of observations, the input of the normalizer.
    pub input_shape: usize,

    /// Backbone shared by the policy and the value function.
    pub backbone: MlpConfig,
}

impl StochasticPolicyModelConfig {
    /// Builds the model.
    pub fn instantiate(&self, action_space: &BoxSpace, device: &Device) -> Result<StochasticPolicyModel> {
        StochasticPolicyModel::build(self.clone(), action_space.clone(), device)
    }

    /// Loads [`StochasticPolicyModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`StochasticPolicyModelConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Gaussian policy and state-value function on a shared backbone.
///
/// The standard deviation of the policy does not depend on the state; its
/// logarithm is a parameter initialised to zero.
pub struct StochasticPolicyModel {
    action_space: BoxSpace,
    device: Device,
    varmap: VarMap,
    normalizer: NormalizeObservations,
    backbone: Mlp,
    action_mean: Linear,
    log_std: Tensor,
    value_head: Linear,
}

impl StochasticPolicyModel {
    fn build(config: StochasticPolicyModelConfig, action_space: BoxSpace, device: &Device) -> Result<Self> {
        check_input("backbone", &config.backbone, config.input_shape)?;
        let act_dim = action_space.dim();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let backbone = Mlp::build(vb.pp("backbone"), config.backbone.clone())?;
        let hidden = backbone.output_dim();
        let action_mean = linear(hidden, act_dim, vb.pp("action_head").pp("mean"))?;
        let log_std = vb
            .pp("action_head")
            .get_with_hints(act_dim, "log_std", Init::Const(0.0))?;
        let value_head = linear(hidden, 1, vb.pp("value_head"))?;
        info!(
            "Built stochastic policy model with {} parameter tensors",
            varmap.all_vars().len()
        );

        Ok(Self {
            action_space,
            device: device.clone(),
            varmap,
            normalizer: NormalizeObservations::new(config.input_shape),
            backbone,
            action_mean,
            log_std,
            value_head,
        })
    }

    fn heads(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let xs = self.normalizer.forward(obs)?;
        let xs = self.backbone.forward(&xs)?;
        let mean = self.action_mean.forward(&xs)?;
        let value = self.value_head.forward(&xs)?.squeeze(D::Minus1)?;
        Ok((mean, value))
    }

    /// Samples actions. Returns `(actions [batch, act_dim], logprobs [batch], values [batch])`.
    ///
    /// Actions are not clipped to the action space.
    pub fn step(&self, obs: &Tensor, rng: &mut impl Rng) -> Result<(Tensor, Tensor, Tensor)> {
        let (mean, value) = self.heads(obs)?;
        let action = distribution::sample(&mean, &self.log_std, rng)?;
        let logprob = distribution::log_prob(&mean, &self.log_std, &action)?;
        Ok((action, logprob, value))
    }

    /// Values `[batch]` of observations.
    pub fn value(&self, obs: &Tensor) -> Result<Tensor> {
        Ok(self.heads(obs)?.1)
    }

    /// Returns `(logprobs [batch], entropy (scalar), values [batch])` of given actions.
    pub fn evaluate(&self, obs: &Tensor, actions: &Tensor) -> Result<(Tensor, Tensor, Tensor)> {
        let (mean, value) = self.heads(obs)?;
        let logprob = distribution::log_prob(&mean, &self.log_std, actions)?;
        let entropy = distribution::entropy(&self.log_std)?;
        Ok((logprob, entropy, value))
    }

    /// `[input block, backbone, action head + value head]`. The input block has no parameters.
    pub fn layer_groups(&self) -> Result<Vec<Vec<Var>>> {
        let mut heads = vars_with_prefix(&self.varmap, "action_head")?;
        heads.extend(vars_with_prefix(&self.varmap, "value_head")?);
        Ok(vec![vec![], vars_with_prefix(&self.varmap, "backbone")?, heads])
    }

    /// All parameters.
    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    /// Observation normalizer.
    pub fn normalizer(&self) -> &NormalizeObservations {
        &self.normalizer
    }

    /// Observation normalizer, for updating its statistics.
    pub fn normalizer_mut(&mut self) -> &mut NormalizeObservations {
        &mut self.normalizer
    }

    /// Action space.
    pub fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    /// Device of the parameters.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Saves parameters and normalizer statistics in directory `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_files(path.as_ref(), &self.varmap, &self.normalizer)?;
        info!("Saved the model in {:?}", path.as_ref());
        Ok(())
    }

    /// Loads parameters and normalizer statistics from directory `path`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path.as_ref().join("model.safetensors"))?;
        self.normalizer = NormalizeObservations::load(path.as_ref().join("normalizer.yaml"))?;
        Ok(())
    }
}
