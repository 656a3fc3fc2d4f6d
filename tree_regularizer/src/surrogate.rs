use std::num::NonZeroUsize;

use log::{debug, trace, warn};
use machine_learning::{
    Dataset,
    arch::{
        Model, Sequential,
        activations::ActFn,
        init::ParamInit,
        layers::Layer,
        loss::{LossFn, Mse},
    },
    optimization::Adam,
};
use ndarray::{Array2, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    complexity::ComplexityObservation,
    error::{Result, TrainErr},
};

/// Where a surrogate fit starts from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurrogateStart {
    /// Freshly initialized weights on every fit.
    #[default]
    Retrain,
    /// The previous surrogate's weights, if there is one.
    WarmStart,
}

/// Predicts the average path length of a network straight from its parameter vector.
///
/// A two layer perceptron, `P -> hidden (sigmoid) -> 1 (linear)`.
#[derive(Debug, Clone)]
pub struct SurrogateRegressor {
    arch: Sequential,
    params: Vec<f32>,
}

impl SurrogateRegressor {
    /// Creates a new `SurrogateRegressor` with Xavier initialized weights.
    ///
    /// # Arguments
    /// * `input_dim` - The length of the parameter vectors it takes.
    /// * `hidden` - The width of its hidden layer.
    /// * `rng` - The random number generator the weights are drawn from.
    pub fn new<R: Rng>(input_dim: usize, hidden: usize, rng: &mut R) -> Result<Self> {
        let arch = Sequential::new([
            Layer::dense((input_dim, hidden), Some(ActFn::sigmoid(1.0))),
            Layer::dense((hidden, 1), None),
        ]);

        let params = ParamInit::XavierUniform.params(&arch, rng)?;
        Ok(Self { arch, params })
    }

    pub fn input_dim(&self) -> usize {
        self.arch.input_dim()
    }

    pub fn hidden(&self) -> usize {
        self.arch.layers().first().map_or(0, |l| l.dim().1)
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Predicts the average path length of the network holding `vector`.
    pub fn predict(&self, vector: &[f32]) -> Result<f32> {
        let x = self.as_input(vector)?;
        let y = self.arch.predict(&self.params, x)?;
        Ok(y[[0, 0]])
    }

    /// Predicts the average path length of `vector` along with its gradient with respect to
    /// every entry of `vector`.
    pub fn predict_with_gradient(&mut self, vector: &[f32]) -> Result<(f32, Vec<f32>)> {
        let x = self.as_input(vector)?;
        let y = self.arch.forward(&self.params, x)?;

        let mut scratch = vec![0.0; self.params.len()];
        let dx = self
            .arch
            .backward(&self.params, &mut scratch, Array2::ones(y.dim()))?;

        Ok((y[[0, 0]], dx.row(0).to_vec()))
    }

    /// Computes the mean squared error of the predictions over `observations`.
    pub fn evaluate(&self, observations: &[ComplexityObservation]) -> Result<f32> {
        let (x, y) = stack(observations, self.input_dim())?;
        let y_pred = self.arch.predict(&self.params, x.view())?;
        Ok(Mse.loss(y_pred.view(), y.view()))
    }

    fn as_input<'a>(&self, vector: &'a [f32]) -> Result<ArrayView2<'a, f32>> {
        let mismatch = TrainErr::ShapeMismatch {
            what: "surrogate input",
            got: vector.len(),
            expected: self.input_dim(),
        };

        if vector.len() != self.input_dim() {
            return Err(mismatch);
        }

        ArrayView2::from_shape((1, vector.len()), vector).map_err(|_| mismatch)
    }
}

/// Joins the observations into a feature matrix of parameter vectors and a target column.
fn stack(observations: &[ComplexityObservation], dim: usize) -> Result<(Array2<f32>, Array2<f32>)> {
    if let Some(bad) = observations.iter().find(|o| o.params.len() != dim) {
        return Err(TrainErr::ShapeMismatch {
            what: "observation parameters",
            got: bad.params.len(),
            expected: dim,
        });
    }

    let x = Array2::from_shape_fn((observations.len(), dim), |(i, j)| observations[i].params[j]);
    let y = Array2::from_shape_fn((observations.len(), 1), |(i, _)| observations[i].apl);
    Ok((x, y))
}

/// The result of a surrogate fit.
#[derive(Debug, Clone)]
pub struct SurrogateFit {
    pub surrogate: SurrogateRegressor,
    /// The loss over the observations once the fit finished.
    pub final_loss: f32,
    /// The loss of every iteration, taken before its update.
    pub history: Vec<f32>,
}

/// Fits `SurrogateRegressor`s on complexity observations, full batch, with Adam.
#[derive(Debug, Clone)]
pub struct SurrogateTrainer {
    hidden: usize,
    learning_rate: f32,
    threshold: f32,
    max_iters: usize,
}

impl SurrogateTrainer {
    pub const MIN_OBSERVATIONS: usize = 2;

    /// Creates a new `SurrogateTrainer`.
    ///
    /// # Arguments
    /// * `hidden` - The hidden layer width of the surrogates it creates.
    /// * `learning_rate` - Adam's learning rate.
    /// * `threshold` - The fit stops once the loss goes below this value.
    /// * `max_iters` - The fit stops after this many iterations regardless of the loss.
    pub fn new(hidden: usize, learning_rate: f32, threshold: f32, max_iters: usize) -> Self {
        Self {
            hidden,
            learning_rate,
            threshold,
            max_iters,
        }
    }

    /// Fits a surrogate to `observations`.
    ///
    /// # Arguments
    /// * `observations` - At least two observations, all with the same parameter length.
    /// * `start` - Whether to start from fresh weights or from `previous`.
    /// * `previous` - The surrogate of the last fit, if any.
    /// * `rng` - Draws the fresh weights.
    ///
    /// # Returns
    /// The fit, `InsufficientData` with fewer than two observations or `ShapeMismatch` if the
    /// parameter lengths differ.
    pub fn train<R: Rng>(
        &self,
        observations: &[ComplexityObservation],
        start: SurrogateStart,
        previous: Option<&SurrogateRegressor>,
        rng: &mut R,
    ) -> Result<SurrogateFit> {
        if observations.len() < Self::MIN_OBSERVATIONS {
            return Err(TrainErr::InsufficientData {
                got: observations.len(),
                required: Self::MIN_OBSERVATIONS,
            });
        }

        let dim = observations[0].params.len();
        if dim == 0 {
            return Err(TrainErr::EmptyInput {
                what: "observation parameters",
            });
        }

        let (x, y) = stack(observations, dim)?;
        let dataset = Dataset::from_arrays(x.view(), y.view())?;

        let mut surrogate = match (start, previous) {
            (SurrogateStart::WarmStart, Some(prev))
                if prev.input_dim() == dim && prev.hidden() == self.hidden =>
            {
                prev.clone()
            }
            (SurrogateStart::WarmStart, Some(prev)) => {
                warn!(
                    input_dim = prev.input_dim(),
                    expected = dim;
                    "previous surrogate doesn't fit the observations, starting from fresh weights"
                );
                SurrogateRegressor::new(dim, self.hidden, rng)?
            }
            _ => SurrogateRegressor::new(dim, self.hidden, rng)?,
        };

        let full_batch = NonZeroUsize::new(dataset.len()).unwrap_or(NonZeroUsize::MIN);
        let mut optimizer = Adam::with_learning_rate(surrogate.params.len(), self.learning_rate);
        let mut grad = vec![0.0; surrogate.params.len()];
        let mut history = Vec::with_capacity(self.max_iters);

        let SurrogateRegressor { arch, params } = &mut surrogate;

        for iter in 0..self.max_iters {
            let loss = arch.backprop(
                params,
                &mut grad,
                &Mse,
                &mut optimizer,
                dataset.batches(full_batch),
            )?;
            history.push(loss);

            trace!(iter = iter, loss = loss; "surrogate iteration");

            if !loss.is_finite() || loss < self.threshold {
                break;
            }
        }

        let final_loss = surrogate.evaluate(observations)?;

        debug!(
            observations = observations.len(),
            iters = history.len(),
            final_loss = final_loss;
            "surrogate fit finished"
        );

        Ok(SurrogateFit {
            surrogate,
            final_loss,
            history,
        })
    }
}
