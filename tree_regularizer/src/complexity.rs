use machine_learning::Network;
use ndarray::{ArrayView1, ArrayView2};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    config::{Pruning, TreeConfig},
    error::{Result, TrainErr},
    tree::{Cart, CartParams, TreeClassifier, select_ccp_alpha},
};

/// A parameter vector paired with the average path length measured for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityObservation {
    pub params: Vec<f32>,
    pub apl: f32,
}

/// Measures how complex a decision tree must be to mimic a network.
#[derive(Debug, Clone)]
pub struct ComplexityEstimator {
    tree: TreeConfig,
    seed: u64,
}

impl ComplexityEstimator {
    /// Creates a new `ComplexityEstimator`.
    ///
    /// # Arguments
    /// * `tree` - How the mimicking trees are grown and pruned.
    /// * `seed` - Seeds the fold shuffle of cross validated pruning on every estimate.
    pub fn new(tree: TreeConfig, seed: u64) -> Self {
        Self { tree, seed }
    }

    /// Computes the average path length of a tree fit to the network's decisions.
    ///
    /// Every reference sample is labeled with the network's thresholded output, a tree is fit
    /// to those labels and the amount of nodes each sample visits, root and leaf included, is
    /// averaged. The network is only read.
    ///
    /// # Arguments
    /// * `model` - The network to mimic.
    /// * `x_reference` - The samples the network is labeling.
    ///
    /// # Returns
    /// The average path length, at least `1`, or `EmptyInput` if there are no samples.
    pub fn average_path_length(&self, model: &Network, x_reference: ArrayView2<f32>) -> Result<f32> {
        if x_reference.nrows() == 0 {
            return Err(TrainErr::EmptyInput {
                what: "reference set",
            });
        }

        let y_pred = model.predict(x_reference)?;
        if y_pred.ncols() != 1 {
            return Err(TrainErr::ShapeMismatch {
                what: "network outputs",
                got: y_pred.ncols(),
                expected: 1,
            });
        }

        let labels = y_pred.column(0).mapv(|p| if p > 0.5 { 1.0 } else { 0.0 });
        let tree = self.fit_tree(x_reference, labels.view())?;
        let lengths = tree.path_lengths(x_reference)?;

        Ok(lengths.iter().sum::<usize>() as f32 / lengths.len() as f32)
    }

    /// Fits a tree to `(x, y)`, pruned the configured way.
    pub fn fit_tree(&self, x: ArrayView2<f32>, y: ArrayView1<f32>) -> Result<Cart> {
        let params = CartParams {
            min_samples_leaf: self.tree.min_samples_leaf,
            max_depth: self.tree.max_depth,
            ..Default::default()
        };

        let ccp_alpha = match self.tree.pruning {
            Pruning::None => 0.0,
            Pruning::Alpha { ccp_alpha } => ccp_alpha,
            Pruning::CrossValidated { folds } => {
                let mut rng = StdRng::seed_from_u64(self.seed);
                select_ccp_alpha(&params, x, y, folds, &mut rng)?
            }
        };

        Cart::fit(&CartParams { ccp_alpha, ..params }, x, y)
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::{Sequential, activations::ActFn, layers::Layer};
    use ndarray::{Array2, array};

    use super::*;

    fn network(params: Vec<f32>) -> Network {
        let arch = Sequential::new([
            Layer::dense((2, 2), Some(ActFn::relu())),
            Layer::dense((2, 1), Some(ActFn::sigmoid(1.0))),
        ]);

        Network::new(arch, params).unwrap()
    }

    fn reference() -> Array2<f32> {
        Array2::from_shape_fn((30, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f32 / 10.0 - 0.5)
    }

    #[test]
    fn constant_network_gives_a_single_leaf() {
        let estimator = ComplexityEstimator::new(TreeConfig::default(), 0);
        let net = network(vec![0.0; 9]);

        let apl = estimator.average_path_length(&net, reference().view()).unwrap();
        assert_eq!(apl, 1.0);
    }

    #[test]
    fn single_threshold_network_gives_depth_one_paths() {
        let estimator = ComplexityEstimator::new(TreeConfig::default(), 0);
        // hidden = relu(x0), output = sigmoid(10 * hidden - 1): positive iff x0 > 0.1
        #[rustfmt::skip]
        let net = network(vec![
            1.0, 0.0,
            0.0, 0.0,
            0.0, 0.0,
            10.0, 0.0,
            -1.0,
        ]);

        let x = array![[-0.4, 0.0], [0.0, 0.3], [0.2, -0.1], [0.5, 0.5]];
        let apl = estimator.average_path_length(&net, x.view()).unwrap();

        assert_eq!(apl, 2.0);
    }

    #[test]
    fn same_inputs_same_apl() {
        let tree = TreeConfig {
            pruning: Pruning::CrossValidated { folds: 3 },
            ..Default::default()
        };
        let estimator = ComplexityEstimator::new(tree, 42);
        let params: Vec<f32> = (0..9).map(|i| ((i * 5 % 9) as f32 - 4.0) * 0.7).collect();
        let net = network(params);
        let x = reference();

        let a = estimator.average_path_length(&net, x.view()).unwrap();
        let b = estimator.average_path_length(&net, x.view()).unwrap();

        assert_eq!(a, b);
        assert!(a >= 1.0);
    }

    #[test]
    fn estimate_never_mutates_the_network() {
        let estimator = ComplexityEstimator::new(TreeConfig::default(), 0);
        let params: Vec<f32> = (0..9).map(|i| i as f32 * 0.1 - 0.4).collect();
        let net = network(params.clone());

        estimator.average_path_length(&net, reference().view()).unwrap();
        assert_eq!(net.flatten(), params);
    }

    #[test]
    fn empty_reference_set_fails() {
        let estimator = ComplexityEstimator::new(TreeConfig::default(), 0);
        let net = network(vec![0.0; 9]);
        let x = Array2::<f32>::zeros((0, 2));

        let err = estimator.average_path_length(&net, x.view()).unwrap_err();
        assert!(matches!(
            err,
            TrainErr::EmptyInput {
                what: "reference set"
            }
        ));
    }
}
