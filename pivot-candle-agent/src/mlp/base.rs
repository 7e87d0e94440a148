use super::MlpConfig;
use crate::Activation;
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};

/// Multilayer perceptron with an activation after every layer.
///
/// Used as a backbone; heads are attached by the models.
pub struct Mlp {
    config: MlpConfig,
    layers: Vec<Linear>,
}

impl Mlp {
    /// Builds the layers under `vb`, named `ln0`, `ln1`, ...
    pub fn build(vb: VarBuilder, config: MlpConfig) -> Result<Self> {
        let mut in_dim = config.input_length;
        let mut layers = Vec::with_capacity(config.hidden_layers.len());
        for (i, &out_dim) in config.hidden_layers.iter().enumerate() {
            layers.push(linear(in_dim, out_dim, vb.pp(format!("ln{}", i)))?);
            in_dim = out_dim;
        }

        Ok(Self { config, layers })
    }

    /// Forward pass; `xs` is `[batch, input_length]`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let act: &Activation = &self.config.activation;
        let mut xs = xs.clone();
        for layer in self.layers.iter() {
            xs = act.forward(&layer.forward(&xs)?)?;
        }
        Ok(xs)
    }

    /// Width of the output.
    pub fn output_dim(&self) -> usize {
        self.config.output_dim()
    }

    /// Configuration.
    pub fn config(&self) -> &MlpConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_mlp_shape_and_range() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = Mlp::build(
            vb.pp("backbone"),
            MlpConfig::new(17, vec![64, 64], Activation::Tanh),
        )?;
        let xs = Tensor::ones((5, 17), DType::F32, &Device::Cpu)?;
        let ys = mlp.forward(&xs)?;

        assert_eq!(ys.dims(), &[5, 64]);
        let max = ys.abs()?.max_keepdim(1)?.max_keepdim(0)?.flatten_all()?.to_vec1::<f32>()?[0];
        assert!(max <= 1.0);
        assert_eq!(varmap.all_vars().len(), 4);
        Ok(())
    }
}
