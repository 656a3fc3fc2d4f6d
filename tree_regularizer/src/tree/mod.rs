mod cart;
mod pruning;

use ndarray::{Array1, ArrayView1, ArrayView2};

pub use cart::{Cart, CartParams};
pub use pruning::select_ccp_alpha;

use crate::error::Result;

/// The effective alphas of a tree's minimal cost-complexity pruning sequence.
///
/// `ccp_alphas[i]` is the alpha at which the `i`-th pruning happens and `impurities[i]` the
/// total leaf impurity of the tree right after it. The first entry is always the unpruned tree
/// at alpha `0` and the last one the tree pruned down to its root.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PruningPath {
    pub ccp_alphas: Vec<f64>,
    pub impurities: Vec<f64>,
}

/// A decision tree classifier, everything the complexity estimate needs from one.
pub trait TreeClassifier: Sized {
    type Params;

    /// Fits a new tree to the samples `x` labeled by `y`.
    fn fit(params: &Self::Params, x: ArrayView2<f32>, y: ArrayView1<f32>) -> Result<Self>;

    /// Predicts a label for every row of `x`.
    fn predict(&self, x: ArrayView2<f32>) -> Result<Array1<f32>>;

    /// Returns how many nodes each row of `x` visits from the root to its leaf, both included.
    fn path_lengths(&self, x: ArrayView2<f32>) -> Result<Vec<usize>>;

    /// Computes the minimal cost-complexity pruning path of this tree.
    fn cost_complexity_pruning_path(&self) -> PruningPath;

    /// Prunes every subtree whose effective alpha is at most `ccp_alpha`.
    fn prune(&self, ccp_alpha: f64) -> Self;

    /// Returns the amount of nodes in the tree.
    fn node_count(&self) -> usize;
}
