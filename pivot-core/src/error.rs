//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum PivotError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// Shape of given data does not match the expected one.
    #[error("Shape mismatch in {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// What was checked.
        name: String,
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Sampling was requested from a buffer holding no transitions.
    #[error("Cannot sample from an empty replay buffer")]
    EmptyBuffer,

    /// The number of per-group hyperparameters does not match the number of layer groups.
    #[error("{name} has {given} values but the model has {groups} layer groups")]
    LayerGroupMismatch {
        /// Name of the hyperparameter.
        name: String,
        /// The number of values given.
        given: usize,
        /// The number of layer groups of the model.
        groups: usize,
    },

    /// Unknown name of an RL algorithm.
    #[error("Unknown algo {0}")]
    UnknownAlgorithm(String),

    /// Unknown name of an environment.
    #[error("Unknown environment {0}")]
    UnknownEnvironment(String),

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Simulation state contains NaN or infinity.
    #[error("Non-finite state in {0}")]
    NonFiniteState(String),
}
