use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::{Model, Sequential, layers::Layer};
use crate::{MlErr, Result};

/// How to draw the initial weights of every dense layer. Biases always start at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamInit {
    /// `U(-r, r)` with `r = sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
    /// `N(0, sqrt(2 / fan_in))`.
    Kaiming,
}

impl ParamInit {
    /// Creates a fresh parameter vector for `model`.
    ///
    /// # Arguments
    /// * `model` - The model whose layout the parameters follow.
    /// * `rng` - The random number generator to sample from.
    ///
    /// # Returns
    /// The parameters or an error if a layer's fan makes the distribution invalid.
    pub fn params<R: Rng>(&self, model: &Sequential, rng: &mut R) -> Result<Vec<f32>> {
        let mut params = Vec::with_capacity(model.size());

        for layer in model.layers() {
            let Layer::Dense(dense) = layer;
            let (fan_in, fan_out) = dense.dim();

            let weights = self.sample(rng, fan_in, fan_out)?;
            params.extend(weights);
            params.extend(std::iter::repeat_n(0.0, fan_out));
        }

        Ok(params)
    }

    fn sample<R: Rng>(&self, rng: &mut R, fan_in: usize, fan_out: usize) -> Result<Vec<f32>> {
        let n = fan_in * fan_out;

        let weights = match *self {
            ParamInit::XavierUniform => {
                let range = (6. / (fan_in + fan_out) as f32).sqrt();
                let uniform = Uniform::new(-range, range)
                    .map_err(|_| MlErr::InvalidInput("xavier range is empty"))?;
                uniform.sample_iter(rng).take(n).collect()
            }
            ParamInit::Kaiming => {
                let std_dev = (2. / fan_in as f32).sqrt();
                let normal = Normal::new(0., std_dev)
                    .map_err(|_| MlErr::InvalidInput("kaiming deviation is not finite"))?;
                normal.sample_iter(rng).take(n).collect()
            }
        };

        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn xavier_weights_are_bounded_and_biases_zero() {
        let model = Sequential::new([Layer::dense((2, 4), None), Layer::dense((4, 1), None)]);
        let mut rng = StdRng::seed_from_u64(7);

        let params = ParamInit::XavierUniform.params(&model, &mut rng).unwrap();
        assert_eq!(params.len(), model.size());

        let range = (6f32 / 6.).sqrt();
        assert!(params[..8].iter().all(|w| w.abs() <= range));
        assert!(params[8..12].iter().all(|&b| b == 0.0));
        assert_eq!(params[16], 0.0);
    }

    #[test]
    fn same_seed_same_params() {
        let model = Sequential::new([Layer::dense((3, 3), None)]);

        let a = ParamInit::Kaiming
            .params(&model, &mut StdRng::seed_from_u64(1))
            .unwrap();
        let b = ParamInit::Kaiming
            .params(&model, &mut StdRng::seed_from_u64(1))
            .unwrap();

        assert_eq!(a, b);
    }
}
