use log::{debug, info};
use machine_learning::{Dataset, Network, arch::loss::Mse, optimization::Adam};
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;

use crate::{
    augment::DataAugmentor,
    complexity::{ComplexityEstimator, ComplexityObservation},
    config::RetrainBudget,
    context::TrainingContext,
    error::{Result, TrainErr},
    loss::TreeRegularizedLoss,
    metrics::MetricsSink,
    surrogate::{SurrogateRegressor, SurrogateTrainer},
};

/// The loss the primary network is currently trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingMode {
    /// Plain mean squared error.
    Standard,
    /// Mean squared error plus the surrogate's complexity penalty.
    SurrogateGuided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochKind {
    /// A pass on the plain loss followed by a complexity measurement.
    Standard,
    /// A pass on the regularized loss followed by a complexity measurement.
    Guided,
    /// A surrogate fit followed by a regularized pass.
    Retrain,
}

/// What happened during one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub kind: EpochKind,
    /// The mean batch loss of the epoch's pass.
    pub loss: f32,
    pub apl: Option<f32>,
    /// Buffered observations once the epoch finished.
    pub buffer_len: usize,
    pub surrogate_loss: Option<f32>,
}

/// The observations collected since the last retrain, never more than `capacity`.
#[derive(Debug, Clone)]
pub struct ObservationBuffer {
    capacity: usize,
    observations: Vec<ComplexityObservation>,
}

impl ObservationBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            observations: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn observations(&self) -> &[ComplexityObservation] {
        &self.observations
    }

    /// Appends an observation.
    ///
    /// The scheduler retrains as soon as the buffer fills, so pushing into a full buffer is
    /// a logic error.
    pub fn push(&mut self, observation: ComplexityObservation) {
        debug_assert!(!self.is_full(), "observation buffer is full");
        self.observations.push(observation);
    }

    /// Takes every observation out, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<ComplexityObservation> {
        std::mem::replace(&mut self.observations, Vec::with_capacity(self.capacity))
    }
}

/// Alternates between training the primary network and fitting a surrogate of its
/// complexity.
///
/// Every standard epoch trains the network and records its parameters with the measured
/// average path length. Once `surrogate_interval` observations are buffered the surrogate is
/// refit on them, the network switches to the regularized loss for good and the buffer starts
/// over.
pub struct Scheduler<'a, S: MetricsSink> {
    ctx: &'a TrainingContext,
    network: Network,
    train: Dataset,
    x_reference: Array2<f32>,
    sink: S,
    rng: StdRng,

    optimizer: Adam,
    grad: Vec<f32>,
    estimator: ComplexityEstimator,
    trainer: SurrogateTrainer,
    augmentor: DataAugmentor,
    loss: TreeRegularizedLoss,

    surrogate: Option<SurrogateRegressor>,
    mode: TrainingMode,
    buffer: ObservationBuffer,
    countdown: usize,
    retrains: usize,
    history: Vec<EpochRecord>,
}

impl<'a, S: MetricsSink> Scheduler<'a, S> {
    /// Creates a new `Scheduler`.
    ///
    /// # Arguments
    /// * `ctx` - The run's context.
    /// * `network` - The primary network, single output.
    /// * `train` - The training samples, with a single target each.
    /// * `x_reference` - The samples the network's complexity is measured on.
    /// * `sink` - Receives the run's scalar series.
    pub fn new(
        ctx: &'a TrainingContext,
        network: Network,
        train: Dataset,
        x_reference: Array2<f32>,
        sink: S,
    ) -> Result<Self> {
        let input_dim = network.architecture().input_dim();

        if train.is_empty() {
            return Err(TrainErr::EmptyInput {
                what: "training set",
            });
        }

        if x_reference.nrows() == 0 {
            return Err(TrainErr::EmptyInput {
                what: "reference set",
            });
        }

        let checks = [
            ("training features", train.x_size(), input_dim),
            ("training targets", train.y_size(), 1),
            ("reference features", x_reference.ncols(), input_dim),
            ("network outputs", network.architecture().output_dim(), 1),
        ];

        for (what, got, expected) in checks {
            if got != expected {
                return Err(TrainErr::ShapeMismatch {
                    what,
                    got,
                    expected,
                });
            }
        }

        let interval = ctx.config().surrogate_interval;

        Ok(Self {
            ctx,
            optimizer: ctx.optimizer(network.size()),
            grad: vec![0.0; network.size()],
            estimator: ctx.estimator(),
            trainer: ctx.surrogate_trainer(),
            augmentor: ctx.augmentor(),
            loss: ctx.loss(),
            rng: ctx.rng(),
            network,
            train,
            x_reference,
            sink,
            surrogate: None,
            mode: TrainingMode::Standard,
            buffer: ObservationBuffer::new(interval),
            countdown: interval,
            retrains: 0,
            history: Vec::new(),
        })
    }

    /// Runs every configured epoch.
    pub fn run(&mut self) -> Result<()> {
        for epoch in 0..self.ctx.config().epochs {
            self.run_epoch(epoch)?;
        }

        info!(
            epochs = self.ctx.config().epochs,
            retrains = self.retrains;
            "training finished"
        );

        Ok(())
    }

    /// Runs a single epoch.
    pub fn run_epoch(&mut self, epoch: usize) -> Result<()> {
        match self.ctx.config().retrain_budget {
            RetrainBudget::Additional => {
                self.observe_epoch(epoch)?;
                if self.countdown == 0 {
                    self.retrain(epoch)?;
                }
            }
            RetrainBudget::Counted => {
                if self.countdown == 0 {
                    self.retrain(epoch)?;
                } else {
                    self.observe_epoch(epoch)?;
                }
            }
        }

        Ok(())
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn into_network(self) -> Network {
        self.network
    }

    pub fn surrogate(&self) -> Option<&SurrogateRegressor> {
        self.surrogate.as_ref()
    }

    pub fn mode(&self) -> TrainingMode {
        self.mode
    }

    pub fn buffer(&self) -> &ObservationBuffer {
        &self.buffer
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Epochs left until the next retrain.
    pub fn countdown(&self) -> usize {
        self.countdown
    }

    pub fn retrains(&self) -> usize {
        self.retrains
    }

    pub fn history(&self) -> &[EpochRecord] {
        &self.history
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Trains one pass, then records the parameters and their measured complexity.
    fn observe_epoch(&mut self, epoch: usize) -> Result<()> {
        let kind = match self.mode {
            TrainingMode::Standard => EpochKind::Standard,
            TrainingMode::SurrogateGuided => EpochKind::Guided,
        };

        let loss = self.training_pass(epoch)?;
        let apl = self
            .estimator
            .average_path_length(&self.network, self.x_reference.view())?;

        self.buffer.push(ComplexityObservation {
            params: self.network.flatten(),
            apl,
        });
        self.countdown = self.countdown.saturating_sub(1);

        self.sink.scalar("train/loss", epoch, loss);
        self.sink.scalar("train/apl", epoch, apl);

        info!(
            epoch = epoch,
            loss = loss,
            apl = apl,
            buffered = self.buffer.len();
            "epoch finished"
        );

        self.history.push(EpochRecord {
            epoch,
            kind,
            loss,
            apl: Some(apl),
            buffer_len: self.buffer.len(),
            surrogate_loss: None,
        });

        Ok(())
    }

    /// Refits the surrogate on the buffered observations and trains one regularized pass.
    fn retrain(&mut self, epoch: usize) -> Result<()> {
        if self.buffer.len() < SurrogateTrainer::MIN_OBSERVATIONS {
            return Err(TrainErr::InsufficientData {
                got: self.buffer.len(),
                required: SurrogateTrainer::MIN_OBSERVATIONS,
            });
        }

        let mut observations = self.buffer.drain();
        let synthetic = self.augmentor.augment(
            &observations,
            &self.network,
            &self.estimator,
            self.x_reference.view(),
            &mut self.rng,
        )?;
        observations.extend(synthetic);

        let fit = self.trainer.train(
            &observations,
            self.ctx.config().surrogate_start,
            self.surrogate.as_ref(),
            &mut self.rng,
        )?;

        if !fit.final_loss.is_finite() {
            return Err(TrainErr::NonFiniteLoss {
                epoch,
                loss: fit.final_loss,
            });
        }

        let tag = format!("surrogate/fit_loss/{}", self.retrains);
        for (iter, &loss) in fit.history.iter().enumerate() {
            self.sink.scalar(&tag, iter, loss);
        }
        self.sink.scalar("surrogate/loss", epoch, fit.final_loss);

        debug!(
            epoch = epoch,
            observations = observations.len(),
            final_loss = fit.final_loss;
            "surrogate retrained"
        );

        self.surrogate = Some(fit.surrogate);
        self.mode = TrainingMode::SurrogateGuided;
        self.retrains += 1;

        let loss = self.training_pass(epoch)?;
        self.countdown = self.buffer.capacity();

        info!(
            epoch = epoch,
            loss = loss,
            surrogate_loss = fit.final_loss,
            retrains = self.retrains;
            "surrogate guided pass finished"
        );

        self.history.push(EpochRecord {
            epoch,
            kind: EpochKind::Retrain,
            loss,
            apl: None,
            buffer_len: self.buffer.len(),
            surrogate_loss: Some(fit.final_loss),
        });

        Ok(())
    }

    /// One shuffled mini-batch pass over the training set with the active loss.
    ///
    /// # Returns
    /// The mean batch loss, or `NonFiniteLoss` if it isn't finite.
    fn training_pass(&mut self, epoch: usize) -> Result<f32> {
        self.train.shuffle(&mut self.rng);

        let mut total = 0.0;
        let mut batches = 0;

        for (x, y) in self.train.batches(self.ctx.config().batch_size()) {
            let mut loss = self.network.gradient(x, y, &Mse, &mut self.grad)?;

            if let Some(surrogate) = self.surrogate.as_mut() {
                loss += self
                    .loss
                    .penalize(self.network.params(), surrogate, &mut self.grad)?;
            }

            self.network.step(&mut self.optimizer, &self.grad)?;
            total += loss;
            batches += 1;
        }

        let loss = total / batches.max(1) as f32;
        if !loss.is_finite() {
            return Err(TrainErr::NonFiniteLoss { epoch, loss });
        }

        Ok(loss)
    }

    /// Computes the active loss of the network over `(x, y)` without training.
    pub fn active_loss(&self, x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        let y_pred = self.network.predict(x)?;

        match &self.surrogate {
            Some(surrogate) => {
                self.loss
                    .compute(y_pred.view(), y, self.network.params(), surrogate)
            }
            None => self.loss.data_loss(y_pred.view(), y),
        }
    }
}
