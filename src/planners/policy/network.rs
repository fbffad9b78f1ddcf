//! Trained policy network using Burn framework

use std::path::Path;

use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::{ElementConversion, TensorData};

use super::{DEFAULT_RADIUS, LocalObservation, PolicyError, PolicySuggester};
use crate::infra::Action;

/// Shape of the policy network
#[derive(Debug, Clone)]
pub struct PolicyNetworkConfig {
    /// Observation length (window cells + target offset)
    pub input_size: usize,
    /// Sizes of the two hidden layers
    pub hidden_sizes: [usize; 2],
    /// Number of discrete actions
    pub action_count: usize,
}

impl Default for PolicyNetworkConfig {
    fn default() -> Self {
        Self {
            input_size: LocalObservation::size_for(DEFAULT_RADIUS),
            hidden_sizes: [128, 64],
            action_count: Action::ALL.len(),
        }
    }
}

/// Actor network - maps a local observation to action logits
#[derive(Module, Debug)]
pub struct PolicyNetwork<B: Backend> {
    input: Linear<B>,
    hidden: Linear<B>,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> PolicyNetwork<B> {
    pub fn new(device: &B::Device, config: &PolicyNetworkConfig) -> Self {
        let [first, second] = config.hidden_sizes;
        Self {
            input: LinearConfig::new(config.input_size, first).init(device),
            hidden: LinearConfig::new(first, second).init(device),
            output: LinearConfig::new(second, config.action_count).init(device),
            activation: Relu::new(),
        }
    }

    /// Forward pass returning raw logits
    pub fn forward(&self, obs: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.input.forward(obs));
        let x = self.activation.forward(self.hidden.forward(x));
        self.output.forward(x)
    }
}

/// Greedy (argmax) inference over a [`PolicyNetwork`].
pub struct NetworkPolicy<B: Backend> {
    model: PolicyNetwork<B>,
    device: B::Device,
    input_size: usize,
}

impl<B: Backend> NetworkPolicy<B> {
    pub fn new(model: PolicyNetwork<B>, device: B::Device, config: &PolicyNetworkConfig) -> Self {
        Self {
            model,
            device,
            input_size: config.input_size,
        }
    }

    /// Load weights from a checkpoint written with a `NamedMpkFileRecorder`.
    pub fn load(
        path: &Path,
        config: &PolicyNetworkConfig,
        device: B::Device,
    ) -> Result<Self, PolicyError> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let model = PolicyNetwork::new(&device, config)
            .load_file(path.to_path_buf(), &recorder, &device)
            .map_err(|err| PolicyError::Load(format!("{}: {:?}", path.display(), err)))?;
        tracing::info!("Loaded policy network from {}", path.display());
        Ok(Self::new(model, device, config))
    }
}

impl<B: Backend> PolicySuggester for NetworkPolicy<B> {
    fn suggest(&self, observation: &LocalObservation) -> Result<Action, PolicyError> {
        if observation.len() != self.input_size {
            return Err(PolicyError::ObservationSize {
                expected: self.input_size,
                actual: observation.len(),
            });
        }

        let data = TensorData::new(observation.features().to_vec(), [1, self.input_size]);
        let input = Tensor::<B, 2>::from_data(data, &self.device);
        let index = self
            .model
            .forward(input)
            .argmax(1)
            .into_scalar()
            .elem::<i64>();

        Action::try_from(index).map_err(PolicyError::InvalidAction)
    }

    fn name(&self) -> &str {
        "network"
    }
}
