use machine_learning::{
    Dataset, Network,
    arch::loss::{LossFn, Mse},
};
use ndarray::{Array1, ArrayView1};
use serde::Serialize;

use crate::{
    complexity::ComplexityEstimator,
    error::{Result, TrainErr},
    tree::{Cart, CartParams, TreeClassifier},
};

/// Leaf size of the tree fit straight to the ground truth labels.
const RAW_TREE_MIN_SAMPLES_LEAF: usize = 25;
/// Split size of the tree fit to the network's labels.
const DISTILLED_TREE_MIN_SAMPLES_SPLIT: usize = 25;

/// Binary confusion counts, labels above `0.5` are positive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Confusion {
    pub true_pos: usize,
    pub false_pos: usize,
    pub false_neg: usize,
    pub true_neg: usize,
}

impl Confusion {
    pub fn from_labels(predicted: ArrayView1<f32>, actual: ArrayView1<f32>) -> Result<Self> {
        if predicted.len() != actual.len() {
            return Err(TrainErr::ShapeMismatch {
                what: "predicted labels",
                got: predicted.len(),
                expected: actual.len(),
            });
        }

        let mut confusion = Self::default();

        for (&p, &a) in predicted.iter().zip(actual) {
            match (p > 0.5, a > 0.5) {
                (true, true) => confusion.true_pos += 1,
                (true, false) => confusion.false_pos += 1,
                (false, true) => confusion.false_neg += 1,
                (false, false) => confusion.true_neg += 1,
            }
        }

        Ok(confusion)
    }

    pub fn total(&self) -> usize {
        self.true_pos + self.false_pos + self.false_neg + self.true_neg
    }

    /// The fraction of correct labels, `0` when there are none.
    pub fn accuracy(&self) -> f32 {
        match self.total() {
            0 => 0.0,
            total => (self.true_pos + self.true_neg) as f32 / total as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreeReport {
    pub nodes: usize,
    pub depth: usize,
    /// The tree's predictions on the test set against the ground truth.
    pub test: Confusion,
}

impl TreeReport {
    fn new(tree: &Cart, test: &Dataset) -> Result<Self> {
        let y_pred = tree.predict(test.x())?;

        Ok(Self {
            nodes: tree.node_count(),
            depth: tree.depth(),
            test: Confusion::from_labels(y_pred.view(), test.y().column(0))?,
        })
    }
}

/// How a trained network, and decision trees mimicking it, perform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub train_loss: f32,
    pub test_loss: f32,
    pub network_train: Confusion,
    pub network_test: Confusion,
    /// A tree fit to the training set's ground truth labels.
    pub tree_raw: TreeReport,
    /// A tree fit to the network's labels of the training set.
    pub tree_distilled: TreeReport,
    /// The network's average path length on the held-out test set.
    pub apl: f32,
}

fn threshold(y: ArrayView1<f32>) -> Array1<f32> {
    y.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 })
}

/// Evaluates `network` on both splits and compares it with decision trees.
///
/// The average path length is measured on `test`, the held-out set training measured it on.
pub fn evaluate(
    network: &Network,
    train: &Dataset,
    test: &Dataset,
    estimator: &ComplexityEstimator,
) -> Result<Evaluation> {
    for split in [train, test] {
        if split.y_size() != 1 {
            return Err(TrainErr::ShapeMismatch {
                what: "evaluation targets",
                got: split.y_size(),
                expected: 1,
            });
        }
    }

    let train_pred = network.predict(train.x())?;
    let test_pred = network.predict(test.x())?;

    let train_labels = threshold(train_pred.column(0));

    let raw = Cart::fit(
        &CartParams {
            min_samples_leaf: RAW_TREE_MIN_SAMPLES_LEAF,
            ..Default::default()
        },
        train.x(),
        train.y().column(0),
    )?;

    let distilled = Cart::fit(
        &CartParams {
            min_samples_split: DISTILLED_TREE_MIN_SAMPLES_SPLIT,
            ..Default::default()
        },
        train.x(),
        train_labels.view(),
    )?;

    Ok(Evaluation {
        train_loss: Mse.loss(train_pred.view(), train.y()),
        test_loss: Mse.loss(test_pred.view(), test.y()),
        network_train: Confusion::from_labels(train_labels.view(), train.y().column(0))?,
        network_test: Confusion::from_labels(
            threshold(test_pred.column(0)).view(),
            test.y().column(0),
        )?,
        tree_raw: TreeReport::new(&raw, test)?,
        tree_distilled: TreeReport::new(&distilled, test)?,
        apl: estimator.average_path_length(network, test.x())?,
    })
}
