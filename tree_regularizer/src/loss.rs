use machine_learning::arch::loss::{LossFn, Mse};
use ndarray::ArrayView2;

use crate::{
    error::{Result, TrainErr},
    surrogate::SurrogateRegressor,
};

/// Mean squared error plus the surrogate's predicted average path length, scaled.
///
/// `L(θ) = mse(ŷ, y) + λ·s(θ)`
#[derive(Debug, Clone, Copy)]
pub struct TreeRegularizedLoss {
    strength: f32,
}

impl TreeRegularizedLoss {
    /// Creates a new `TreeRegularizedLoss` with regularization strength `λ = strength`.
    pub fn new(strength: f32) -> Self {
        Self { strength }
    }

    /// Computes the data term alone, the mean squared error of a batch.
    pub fn data_loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        if y_pred.dim() != y.dim() {
            return Err(TrainErr::ShapeMismatch {
                what: "loss targets",
                got: y.len(),
                expected: y_pred.len(),
            });
        }

        Ok(Mse.loss(y_pred, y))
    }

    /// Computes the regularized loss of a batch.
    ///
    /// # Arguments
    /// * `y_pred` - The network's output for the batch.
    /// * `y` - The batch targets.
    /// * `params` - The network's parameter vector.
    /// * `surrogate` - The complexity surrogate.
    pub fn compute(
        &self,
        y_pred: ArrayView2<f32>,
        y: ArrayView2<f32>,
        params: &[f32],
        surrogate: &SurrogateRegressor,
    ) -> Result<f32> {
        let data = self.data_loss(y_pred, y)?;
        let penalty = surrogate.predict(params)?;
        Ok(data + self.strength * penalty)
    }

    /// Adds the gradient of the penalty term, `λ·∂s/∂θ`, to a data loss gradient.
    ///
    /// # Arguments
    /// * `params` - The network's parameter vector.
    /// * `surrogate` - The complexity surrogate.
    /// * `grad` - The gradient of the data loss, the same length as `params`.
    ///
    /// # Returns
    /// The penalty `λ·s(θ)`.
    pub fn penalize(
        &self,
        params: &[f32],
        surrogate: &mut SurrogateRegressor,
        grad: &mut [f32],
    ) -> Result<f32> {
        if grad.len() != params.len() {
            return Err(TrainErr::ShapeMismatch {
                what: "regularized gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        let (penalty, d_params) = surrogate.predict_with_gradient(params)?;

        for (g, d) in grad.iter_mut().zip(d_params) {
            *g += self.strength * d;
        }

        Ok(self.strength * penalty)
    }
}
