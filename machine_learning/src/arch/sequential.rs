use ndarray::{Array2, ArrayView2};

use super::{Model, layers::Layer};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The parameters of every layer are laid out contiguously in a single slice, in the same
/// order as the layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the amount of input features, `0` for an empty model.
    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, |l| l.dim().0)
    }

    /// Returns the amount of outputs, `0` for an empty model.
    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, |l| l.dim().1)
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::ShapeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("sequential parameters", params.len())?;

        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in &self.layers {
            let size = layer.size();
            a = layer.predict(&params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("sequential parameters", params.len())?;

        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in self.layers.iter_mut() {
            let size = layer.size();
            a = layer.forward(&params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    fn backward(&mut self, params: &[f32], grad: &mut [f32], mut d: Array2<f32>) -> Result<Array2<f32>> {
        self.check_len("sequential parameters", params.len())?;
        self.check_len("sequential gradient", grad.len())?;

        let mut offset = params.len();

        for layer in self.layers.iter_mut().rev() {
            let size = layer.size();
            offset -= size;

            let range = offset..offset + size;
            d = layer.backward(&params[range.clone()], &mut grad[range], d)?;
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{
        arch::{activations::ActFn, loss::Mse},
        optimization::GradientDescent,
    };

    fn and_gate() -> (Array2<f32>, Array2<f32>) {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![[0.0], [0.0], [0.0], [1.0]];
        (x, y)
    }

    #[test]
    fn predict_matches_forward() {
        let mut model = Sequential::new([
            Layer::dense((2, 3), Some(ActFn::sigmoid(1.0))),
            Layer::dense((3, 1), Some(ActFn::sigmoid(1.0))),
        ]);
        let params: Vec<f32> = (0..model.size()).map(|i| 0.1 * i as f32 - 0.5).collect();
        let (x, _) = and_gate();

        let predicted = model.predict(&params, x.view()).unwrap();
        let forwarded = model.forward(&params, x.view()).unwrap();
        assert_eq!(predicted, forwarded);
    }

    #[test]
    fn input_delta_matches_finite_differences() {
        let mut model = Sequential::new([
            Layer::dense((3, 4), Some(ActFn::sigmoid(1.0))),
            Layer::dense((4, 1), None),
        ]);
        let params: Vec<f32> = (0..model.size())
            .map(|i| ((i * 7 % 11) as f32 - 5.0) * 0.1)
            .collect();
        let x = array![[0.3, -0.2, 0.5]];
        let mut grad = vec![0.0; model.size()];

        model.forward(&params, x.view()).unwrap();
        let dx = model.backward(&params, &mut grad, array![[1.0]]).unwrap();

        let eps = 1e-2;
        for j in 0..3 {
            let mut plus = x.clone();
            let mut minus = x.clone();
            plus[[0, j]] += eps;
            minus[[0, j]] -= eps;

            let f_plus = model.predict(&params, plus.view()).unwrap()[[0, 0]];
            let f_minus = model.predict(&params, minus.view()).unwrap()[[0, 0]];
            let numeric = (f_plus - f_minus) / (2.0 * eps);

            assert!(
                (numeric - dx[[0, j]]).abs() < 1e-3,
                "feature {j}: numeric {numeric}, analytic {}",
                dx[[0, j]]
            );
        }
    }

    #[test]
    fn backprop_reduces_loss_on_and_gate() {
        let mut model = Sequential::new([
            Layer::dense((2, 3), Some(ActFn::sigmoid(1.0))),
            Layer::dense((3, 1), Some(ActFn::sigmoid(1.0))),
        ]);
        let mut params: Vec<f32> = (0..model.size())
            .map(|i| ((i * 5 % 7) as f32 - 3.0) * 0.2)
            .collect();
        let mut grad = vec![0.0; model.size()];
        let mut optimizer = GradientDescent::new(2.0);
        let (x, y) = and_gate();

        let first = model
            .backprop(
                &mut params,
                &mut grad,
                &Mse,
                &mut optimizer,
                std::iter::once((x.view(), y.view())),
            )
            .unwrap();

        let mut last = first;
        for _ in 0..2000 {
            last = model
                .backprop(
                    &mut params,
                    &mut grad,
                    &Mse,
                    &mut optimizer,
                    std::iter::once((x.view(), y.view())),
                )
                .unwrap();
        }

        assert!(last < first * 0.5, "first: {first}, last: {last}");
    }
}
