use crate::Activation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    /// Width of the input.
    pub input_length: usize,

    /// Widths of the hidden layers. The last one is the output width.
    pub hidden_layers: Vec<usize>,

    /// Activation applied after every layer.
    pub activation: Activation,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    pub fn new(input_length: usize, hidden_layers: Vec<usize>, activation: Activation) -> Self {
        Self {
            input_length,
            hidden_layers,
            activation,
        }
    }

    /// Width of the output.
    pub fn output_dim(&self) -> usize {
        *self.hidden_layers.last().unwrap_or(&self.input_length)
    }
}
