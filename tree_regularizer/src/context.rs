use machine_learning::{
    Network,
    arch::{Sequential, activations::ActFn, init::ParamInit, layers::Layer},
    optimization::Adam,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    augment::DataAugmentor,
    complexity::ComplexityEstimator,
    config::{ActFnConfig, TrainingConfig},
    error::{Result, TrainErr},
    loss::TreeRegularizedLoss,
    surrogate::SurrogateTrainer,
};

/// Where the numeric work runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
}

/// The validated configuration of a run and the collaborators built from it.
///
/// Built once and handed around by reference.
#[derive(Debug, Clone)]
pub struct TrainingContext {
    config: TrainingConfig,
    device: Device,
    seed: u64,
}

impl TrainingContext {
    /// Creates a new `TrainingContext`.
    ///
    /// # Returns
    /// The context or `TrainErr::Config` if the config is invalid.
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            seed: config.seed,
            config,
            device: Device::Cpu,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A fresh random number generator seeded with the run's seed.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    /// Builds the primary network: the configured hidden layers and a single sigmoid output.
    pub fn build_network<R: Rng>(&self, input_dim: usize, rng: &mut R) -> Result<Network> {
        if input_dim == 0 {
            return Err(TrainErr::EmptyInput {
                what: "input features",
            });
        }

        let (act_fn, init) = match self.config.act_fn {
            ActFnConfig::Sigmoid => (ActFn::sigmoid(1.0), ParamInit::XavierUniform),
            ActFnConfig::Relu => (ActFn::relu(), ParamInit::Kaiming),
        };

        let mut layers = Vec::with_capacity(self.config.hidden.len() + 1);
        let mut prev = input_dim;

        for &width in &self.config.hidden {
            layers.push(Layer::dense((prev, width), Some(act_fn.clone())));
            prev = width;
        }
        layers.push(Layer::dense((prev, 1), Some(ActFn::sigmoid(1.0))));

        Ok(Network::init(Sequential::new(layers), init, rng)?)
    }

    pub fn estimator(&self) -> ComplexityEstimator {
        ComplexityEstimator::new(self.config.tree, self.seed)
    }

    pub fn surrogate_trainer(&self) -> SurrogateTrainer {
        SurrogateTrainer::new(
            self.config.surrogate_hidden,
            self.config.surrogate_learning_rate,
            self.config.surrogate_threshold,
            self.config.surrogate_max_iters,
        )
    }

    pub fn augmentor(&self) -> DataAugmentor {
        DataAugmentor::new(self.config.augmentation)
    }

    pub fn loss(&self) -> TreeRegularizedLoss {
        TreeRegularizedLoss::new(self.config.regularization_strength)
    }

    /// The primary network's optimizer.
    pub fn optimizer(&self, len: usize) -> Adam {
        Adam::with_learning_rate(len, self.config.learning_rate)
    }
}
