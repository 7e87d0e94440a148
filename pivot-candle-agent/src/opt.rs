//! Optimizers.
use anyhow::Result;
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::Optimizer as _;
use candle_optimisers::{
    adam::{Adam, ParamsAdam},
    Decay,
};
use log::{info, trace};
use pivot_core::error::PivotError;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`LayeredOptimizer`], Adam with per-layer-group hyperparameters.
///
/// With `layer_groups`, group `i` of the model uses `lr[i]` and `weight_decay[i]`;
/// a single value applies to every group. Otherwise all parameters form one group
/// using the first values.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LayeredAdamConfig {
    /// Learning rates.
    pub lr: Vec<f64>,

    /// L2 penalties added to the gradients.
    pub weight_decay: Vec<f64>,

    /// Term added to the denominator.
    pub eps: f64,

    /// Decay of the first moment.
    pub beta1: f64,

    /// Decay of the second moment.
    pub beta2: f64,

    /// Whether hyperparameters are given per layer group.
    pub layer_groups: bool,
}

impl Default for LayeredAdamConfig {
    fn default() -> Self {
        Self {
            lr: vec![1e-3],
            weight_decay: vec![0.0],
            eps: 1e-8,
            beta1: 0.9,
            beta2: 0.999,
            layer_groups: false,
        }
    }
}

impl LayeredAdamConfig {
    /// Sets learning rates.
    pub fn lr(mut self, v: Vec<f64>) -> Self {
        self.lr = v;
        self
    }

    /// Sets weight decays.
    pub fn weight_decay(mut self, v: Vec<f64>) -> Self {
        self.weight_decay = v;
        self
    }

    /// Sets epsilon.
    pub fn eps(mut self, v: f64) -> Self {
        self.eps = v;
        self
    }

    /// Sets whether hyperparameters are given per layer group.
    pub fn layer_groups(mut self, v: bool) -> Self {
        self.layer_groups = v;
        self
    }

    fn per_group(name: &str, values: &[f64], groups: usize) -> Result<Vec<f64>> {
        match values.len() {
            1 => Ok(vec![values[0]; groups]),
            n if n == groups => Ok(values.to_vec()),
            n => Err(PivotError::LayerGroupMismatch {
                name: name.to_string(),
                given: n,
                groups,
            }
            .into()),
        }
    }

    /// Builds the optimizer over the layer groups of a model.
    pub fn build(&self, groups: Vec<Vec<Var>>) -> Result<LayeredOptimizer> {
        let groups = match self.layer_groups {
            true => groups,
            false => vec![groups.into_iter().flatten().collect()],
        };
        let n = groups.len();
        let lr = Self::per_group("lr", &self.lr, n)?;
        let weight_decay = Self::per_group("weight_decay", &self.weight_decay, n)?;

        let mut opts = Vec::with_capacity(n);
        for (i, vars) in groups.iter().enumerate() {
            if vars.is_empty() {
                opts.push(None);
                continue;
            }
            let params = ParamsAdam {
                lr: lr[i],
                beta_1: self.beta1,
                beta_2: self.beta2,
                eps: self.eps,
                weight_decay: match weight_decay[i] > 0.0 {
                    true => Some(Decay::WeightDecay(weight_decay[i])),
                    false => None,
                },
                amsgrad: false,
            };
            info!(
                "Layer group {}: {} tensors, lr = {}, weight_decay = {}",
                i,
                vars.len(),
                lr[i],
                weight_decay[i]
            );
            opts.push(Some(Adam::new(vars.clone(), params)?));
        }

        Ok(LayeredOptimizer { opts, groups, lr })
    }

    /// Loads [`LayeredAdamConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`LayeredAdamConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Adam with separate hyperparameters per layer group.
pub struct LayeredOptimizer {
    opts: Vec<Option<Adam>>,
    groups: Vec<Vec<Var>>,
    lr: Vec<f64>,
}

impl LayeredOptimizer {
    /// Applies gradients to every group.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        for opt in self.opts.iter_mut().flatten() {
            opt.step(grads)?;
        }
        Ok(())
    }

    /// Computes gradients of `loss` and applies them.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        let grads = loss.backward()?;
        self.step(&grads)
    }

    /// All optimized parameters.
    pub fn vars(&self) -> Vec<Var> {
        self.groups.iter().flatten().cloned().collect()
    }

    /// The number of layer groups, including those without parameters.
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Learning rate of every group.
    pub fn learning_rates(&self) -> &[f64] {
        &self.lr
    }
}

/// Rescales gradients of `vars` so that their joint L2 norm is at most `max_norm`.
///
/// Returns the norm before clipping.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<f32> {
    let mut total = 0f64;
    for var in vars {
        if let Some(g) = grads.get(var.as_tensor()) {
            total += g.sqr()?.sum_all()?.to_scalar::<f32>()? as f64;
        }
    }
    let total = total.sqrt();

    if total > max_norm {
        let coef = max_norm / (total + 1e-6);
        trace!("Clip gradients: norm = {}, coef = {}", total, coef);
        for var in vars {
            if let Some(g) = grads.remove(var.as_tensor()) {
                grads.insert(var.as_tensor(), (g * coef)?);
            }
        }
    }

    Ok(total as f32)
}
