use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::{Model, Sequential, init::ParamInit, loss::LossFn},
    optimization::Optimizer,
};

/// A `Sequential` architecture together with the parameters it is trained on.
///
/// The parameters are stored as one contiguous vector in layer order, which is also the
/// order `flatten` and `restore` use: for each dense layer its row-major weights followed
/// by its biases.
#[derive(Debug, Clone)]
pub struct Network {
    arch: Sequential,
    params: Vec<f32>,
}

impl Network {
    /// Creates a new `Network`.
    ///
    /// # Returns
    /// The network or `ShapeMismatch` if `params` doesn't fit the architecture.
    pub fn new(arch: Sequential, params: Vec<f32>) -> Result<Self> {
        if params.len() != arch.size() {
            return Err(MlErr::ShapeMismatch {
                what: "network parameters",
                got: params.len(),
                expected: arch.size(),
            });
        }

        Ok(Self { arch, params })
    }

    /// Creates a new `Network` with freshly initialized parameters.
    pub fn init<R: Rng>(arch: Sequential, init: ParamInit, rng: &mut R) -> Result<Self> {
        let params = init.params(&arch, rng)?;
        Self::new(arch, params)
    }

    pub fn architecture(&self) -> &Sequential {
        &self.arch
    }

    /// Returns the amount of scalar parameters.
    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Concatenates every layer's parameters, in layer order, into a new vector.
    pub fn flatten(&self) -> Vec<f32> {
        let mut vector = Vec::with_capacity(self.size());
        let mut offset = 0;

        for layer in self.arch.layers() {
            let size = layer.size();
            vector.extend_from_slice(&self.params[offset..offset + size]);
            offset += size;
        }

        vector
    }

    /// Overwrites the parameters with `vector`, in the same order `flatten` uses.
    ///
    /// # Returns
    /// `ShapeMismatch` if the vector's length isn't the amount of parameters, in which case
    /// the parameters are left untouched.
    pub fn restore(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.params.len() {
            return Err(MlErr::ShapeMismatch {
                what: "parameter vector",
                got: vector.len(),
                expected: self.params.len(),
            });
        }

        self.params.copy_from_slice(vector);
        Ok(())
    }

    /// Builds a disposable copy of this network's architecture loaded with `vector`.
    ///
    /// Used to evaluate candidate parameters without ever writing into this network.
    pub fn probe(&self, vector: &[f32]) -> Result<Network> {
        let mut probe = Network {
            arch: self.arch.clone(),
            params: vec![0.0; self.params.len()],
        };

        probe.restore(vector)?;
        Ok(probe)
    }

    /// Computes the network's output for `x`.
    pub fn predict(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.arch.predict(&self.params, x)
    }

    /// Computes the loss over a batch and overwrites `grad` with its gradient.
    ///
    /// # Arguments
    /// * `x` - The batch features.
    /// * `y` - The batch targets.
    /// * `loss_fn` - The loss function.
    /// * `grad` - A buffer the size of the network's parameters.
    ///
    /// # Returns
    /// The batch loss.
    pub fn gradient<L: LossFn>(
        &mut self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        loss_fn: &L,
        grad: &mut [f32],
    ) -> Result<f32> {
        let y_pred = self.arch.forward(&self.params, x)?;

        if y_pred.dim() != y.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "network targets",
                got: y.ncols(),
                expected: y_pred.ncols(),
            });
        }

        let loss = loss_fn.loss(y_pred.view(), y);
        let d = loss_fn.loss_prime(y_pred.view(), y);
        self.arch.backward(&self.params, grad, d)?;

        Ok(loss)
    }

    /// Applies one optimizer step with `grad`.
    pub fn step<O: Optimizer>(&mut self, optimizer: &mut O, grad: &[f32]) -> Result<()> {
        if grad.len() != self.params.len() {
            return Err(MlErr::ShapeMismatch {
                what: "network gradient",
                got: grad.len(),
                expected: self.params.len(),
            });
        }

        optimizer.update_params(&mut self.params, grad);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::{activations::ActFn, layers::Layer, loss::Mse};

    fn network() -> Network {
        let arch = Sequential::new([
            Layer::dense((2, 3), Some(ActFn::relu())),
            Layer::dense((3, 1), Some(ActFn::sigmoid(1.0))),
        ]);

        Network::init(arch, ParamInit::XavierUniform, &mut StdRng::seed_from_u64(42)).unwrap()
    }

    #[test]
    fn restore_of_flatten_is_exact() {
        let mut net = network();
        let before = net.params().to_vec();

        let vector = net.flatten();
        net.restore(&vector).unwrap();

        assert_eq!(vector, before);
        assert_eq!(
            net.params().iter().map(|p| p.to_bits()).collect::<Vec<_>>(),
            before.iter().map(|p| p.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn restore_with_wrong_length_leaves_params_untouched() {
        let mut net = network();
        let before = net.flatten();

        let err = net.restore(&vec![1.0; before.len() + 1]).unwrap_err();

        assert_eq!(
            err,
            MlErr::ShapeMismatch {
                what: "parameter vector",
                got: before.len() + 1,
                expected: before.len()
            }
        );
        assert_eq!(net.flatten(), before);
    }

    #[test]
    fn probe_never_writes_into_the_source() {
        let net = network();
        let before = net.flatten();

        let probe = net.probe(&vec![0.5; net.size()]).unwrap();

        assert_eq!(probe.flatten(), vec![0.5; net.size()]);
        assert_eq!(net.flatten(), before);
    }

    #[test]
    fn gradient_step_lowers_the_batch_loss() {
        let mut net = network();
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let y = array![[0.0], [1.0]];
        let mut grad = vec![0.0; net.size()];
        let mut optimizer = crate::optimization::GradientDescent::new(0.1);

        let before = net.gradient(x.view(), y.view(), &Mse, &mut grad).unwrap();
        net.step(&mut optimizer, &grad).unwrap();
        let after = net.gradient(x.view(), y.view(), &Mse, &mut grad).unwrap();

        assert!(after < before, "before: {before}, after: {after}");
    }

    #[test]
    fn mismatched_targets_fail() {
        let mut net = network();
        let x = array![[0.0, 0.0]];
        let y = array![[0.0, 1.0]];
        let mut grad = vec![0.0; net.size()];

        assert!(net.gradient(x.view(), y.view(), &Mse, &mut grad).is_err());
    }
}
