use ndarray::{Array2, ArrayView2};

use crate::{arch::loss::LossFn, error::Result, optimization::Optimizer};

/// A differentiable model whose parameters live outside of it, in a flat slice.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Computes the model's output without touching the backward metadata.
    fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the model's output, keeping what's needed for a `backward` call.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Overwrites `grad` with the gradient of the loss with respect to the parameters.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, the same ones used in the last `forward`.
    /// * `grad` - A buffer the size of `params` to write the gradient into.
    /// * `d` - The derivative of the loss with respect to the model's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the model's input.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model over
    /// the provided batches. **`params` gets updated** for each batch according to the
    /// optimization algorithm.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for writing the computed gradient on each batch pass.
    /// * `loss_fn` - The loss function.
    /// * `optimizer` - The optimizer that dictates how to update the weights on each gradient calculation.
    /// * `batches` - The batches of data.
    ///
    /// # Returns
    /// The mean of the batch losses.
    fn backprop<'a, L, O, I>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        loss_fn: &L,
        optimizer: &mut O,
        batches: I,
    ) -> Result<f32>
    where
        L: LossFn,
        O: Optimizer,
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for (x, y) in batches {
            let y_pred = self.forward(params, x)?;
            total_loss += loss_fn.loss(y_pred.view(), y);
            num_batches += 1;

            let d = loss_fn.loss_prime(y_pred.view(), y);
            self.backward(params, grad, d)?;
            optimizer.update_params(params, grad);
        }

        if num_batches == 0 {
            return Ok(0.0);
        }

        Ok(total_loss / num_batches as f32)
    }
}
