use super::{rescale_action, save_files};
use crate::{
    mlp::{Mlp, MlpConfig},
    normalize::NormalizeObservations,
    util::{track, vars_with_prefix},
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, Var, D};
use candle_nn::{linear, Linear, Module, VarBuilder, VarMap};
use log::info;
use pivot_core::{error::PivotError, BoxSpace};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`DeterministicPolicyModel`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DeterministicPolicyModelConfig {
    /// Width of observations, the input of the normalizer.
    pub input_shape: usize,

    /// Backbone of the policy. Its input is the normalized observation.
    pub policy_backbone: MlpConfig,

    /// Backbone of the critic. Its input is the normalized observation
    /// concatenated with the action.
    pub value_backbone: MlpConfig,
}

impl DeterministicPolicyModelConfig {
    /// Builds the model.
    pub fn instantiate(&self, action_space: &BoxSpace, device: &Device) -> Result<DeterministicPolicyModel> {
        DeterministicPolicyModel::build(self.clone(), action_space.clone(), device)
    }

    /// Loads [`DeterministicPolicyModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DeterministicPolicyModelConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Deterministic policy with a Q-function critic.
///
/// * `action(s) = rescale(tanh(action_head(policy_backbone(norm(s)))))`
/// * `value(s, a) = critic_head(value_backbone([norm(s), a]))`
pub struct DeterministicPolicyModel {
    config: DeterministicPolicyModelConfig,
    action_space: BoxSpace,
    device: Device,
    varmap: VarMap,
    normalizer: NormalizeObservations,
    policy_backbone: Mlp,
    action_head: Linear,
    value_backbone: Mlp,
    critic_head: Linear,
}

impl DeterministicPolicyModel {
    fn build(
        config: DeterministicPolicyModelConfig,
        action_space: BoxSpace,
        device: &Device,
    ) -> Result<Self> {
        let act_dim = action_space.dim();
        check_input("policy_backbone", &config.policy_backbone, config.input_shape)?;
        check_input(
            "value_backbone",
            &config.value_backbone,
            config.input_shape + act_dim,
        )?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let policy_backbone = Mlp::build(vb.pp("policy_backbone"), config.policy_backbone.clone())?;
        let action_head = linear(policy_backbone.output_dim(), act_dim, vb.pp("action_head"))?;
        let value_backbone = Mlp::build(vb.pp("value_backbone"), config.value_backbone.clone())?;
        let critic_head = linear(value_backbone.output_dim(), 1, vb.pp("critic_head"))?;
        info!(
            "Built deterministic policy model with {} parameter tensors",
            varmap.all_vars().len()
        );

        Ok(Self {
            normalizer: NormalizeObservations::new(config.input_shape),
            config,
            action_space,
            device: device.clone(),
            varmap,
            policy_backbone,
            action_head,
            value_backbone,
            critic_head,
        })
    }

    /// Action for a batch of observations `[batch, obs_dim]`.
    pub fn action(&self, obs: &Tensor) -> Result<Tensor> {
        let xs = self.normalizer.forward(obs)?;
        let xs = self.policy_backbone.forward(&xs)?;
        let xs = self.action_head.forward(&xs)?.tanh()?;
        rescale_action(&xs, &self.action_space)
    }

    /// Q-values `[batch]` of actions `[batch, act_dim]`.
    pub fn value(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        let xs = self.normalizer.forward(obs)?;
        let xs = Tensor::cat(&[&xs, act], D::Minus1)?;
        let xs = self.value_backbone.forward(&xs)?;
        Ok(self.critic_head.forward(&xs)?.squeeze(D::Minus1)?)
    }

    /// `[policy backbone + action head, value backbone, critic head]`.
    pub fn layer_groups(&self) -> Result<Vec<Vec<Var>>> {
        let mut policy = vars_with_prefix(&self.varmap, "policy_backbone")?;
        policy.extend(vars_with_prefix(&self.varmap, "action_head")?);
        Ok(vec![
            policy,
            vars_with_prefix(&self.varmap, "value_backbone")?,
            vars_with_prefix(&self.varmap, "critic_head")?,
        ])
    }

    /// Parameters of the policy.
    pub fn policy_vars(&self) -> Result<Vec<Var>> {
        let mut vars = vars_with_prefix(&self.varmap, "policy_backbone")?;
        vars.extend(vars_with_prefix(&self.varmap, "action_head")?);
        Ok(vars)
    }

    /// Parameters of the critic.
    pub fn critic_vars(&self) -> Result<Vec<Var>> {
        let mut vars = vars_with_prefix(&self.varmap, "value_backbone")?;
        vars.extend(vars_with_prefix(&self.varmap, "critic_head")?);
        Ok(vars)
    }

    /// A model with the same configuration, parameters and normalizer statistics.
    pub fn duplicate(&self) -> Result<Self> {
        let mut model = Self::build(self.config.clone(), self.action_space.clone(), &self.device)?;
        model.soft_update_from(self, 1.0)?;
        Ok(model)
    }

    /// Blends parameters towards `src` with `tau` and copies its normalizer statistics.
    pub fn soft_update_from(&mut self, src: &Self, tau: f64) -> Result<()> {
        track(&self.varmap, &src.varmap, tau)?;
        self.normalizer = src.normalizer.clone();
        Ok(())
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

pub(super) fn check_input(name: &str, config: &MlpConfig, expected: usize) -> Result<()> {
    if config.input_length != expected {
        return Err(PivotError::ShapeMismatch {
            name: format!("{}.input_length", name),
            expected: vec![expected],
            actual: vec![config.input_length],
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Activation;
    use ndarray::Array2;
    use tempdir::TempDir;

    fn config() -> DeterministicPolicyModelConfig {
        DeterministicPolicyModelConfig {
            input_shape: 17,
            policy_backbone: MlpConfig::new(17, vec![64, 64], Activation::Tanh),
            value_backbone: MlpConfig::new(23, vec![64, 64], Activation::Tanh),
        }
    }

    #[test]
    fn test_shapes_and_groups() -> Result<()> {
        let space = BoxSpace::uniform(6, -1.0, 1.0);
        let model = config().instantiate(&space, &Device::Cpu)?;
        let obs = Tensor::randn(0f32, 1.0, (4, 17), &Device::Cpu)?;

        let act = model.action(&obs)?;
        assert_eq!(act.dims(), &[4, 6]);
        assert_eq!(model.value(&obs, &act)?.dims(), &[4]);

        let groups = model.layer_groups()?;
        assert_eq!(groups.iter().map(|g| g.len()).collect::<Vec<_>>(), vec![6, 4, 2]);
        Ok(())
    }

    #[test]
    fn test_value_input_is_checked() {
        let mut config = config();
        config.value_backbone.input_length = 17;
        let space = BoxSpace::uniform(6, -1.0, 1.0);
        assert!(config.instantiate(&space, &Device::Cpu).is_err());
    }

    #[test]
    fn test_duplicate_and_soft_update() -> Result<()> {
        let space = BoxSpace::uniform(6, -1.0, 1.0);
        let mut model = config().instantiate(&space, &Device::Cpu)?;
        model
            .normalizer_mut()
            .update(&Array2::from_elem((3, 17), 2.0f32));
        let obs = Tensor::randn(0f32, 1.0, (2, 17), &Device::Cpu)?;

        let target = model.duplicate()?;
        let diff = (model.action(&obs)? - target.action(&obs)?)?
            .abs()?
            .sum_all()?
            .to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        assert_eq!(target.normalizer(), model.normalizer());

        let mut target = config().instantiate(&space, &Device::Cpu)?;
        target.soft_update_from(&model, 0.0)?;
        assert_eq!(target.normalizer(), model.normalizer());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let space = BoxSpace::uniform(6, -1.0, 1.0);
        let mut model = config().instantiate(&space, &Device::Cpu)?;
        model
            .normalizer_mut()
            .update(&Array2::from_elem((3, 17), 1.0f32));
        let dir = TempDir::new("deterministic_policy_model")?;
        model.save(dir.path())?;

        let mut model_ = config().instantiate(&space, &Device::Cpu)?;
        model_.load(dir.path())?;
        let obs = Tensor::ones((1, 17), DType::F32, &Device::Cpu)?;
        let diff = (model.action(&obs)? - model_.action(&obs)?)?
            .abs()?
            .sum_all()?
            .to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        assert_eq!(model_.normalizer(), model.normalizer());
        Ok(())
    }
}
