use std::cmp::Ordering;

use log::trace;
use ndarray::{Array1, ArrayView1, ArrayView2};

use super::{PruningPath, TreeClassifier};
use crate::error::{Result, TrainErr};

/// The stopping criteria of a `Cart` fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartParams {
    /// A node with fewer samples is never split.
    pub min_samples_split: usize,
    /// Every leaf keeps at least this many samples.
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
    /// Subtrees with an effective alpha up to this one are pruned after the fit.
    pub ccp_alpha: f64,
}

impl Default for CartParams {
    fn default() -> Self {
        Self {
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_depth: None,
            ccp_alpha: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Split {
    feature: usize,
    threshold: f32,
    left: usize,
    right: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    /// Training samples of each class that reached this node.
    counts: Vec<usize>,
    split: Option<Split>,
}

impl Node {
    fn samples(&self) -> usize {
        self.counts.iter().sum()
    }

    fn gini(&self) -> f64 {
        gini(&self.counts, self.samples())
    }

    /// The majority class, the lowest one on ties.
    fn class(&self) -> usize {
        let mut best = 0;

        for (class, &count) in self.counts.iter().enumerate() {
            if count > self.counts[best] {
                best = class;
            }
        }

        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }

    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| (c as f64 / n).powi(2))
        .sum::<f64>()
}

/// A binary classification and regression tree grown with the gini criterion.
///
/// Samples go to the left child when `x[feature] <= threshold`. Thresholds are the midpoints
/// between consecutive distinct feature values, and among equally good splits the first one
/// found, by feature and then by position, wins. Growing is fully deterministic.
///
/// Nodes are stored in preorder, so every child has a larger index than its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    classes: Vec<f32>,
    n_features: usize,
    nodes: Vec<Node>,
}

struct Grower<'a> {
    params: &'a CartParams,
    x: ArrayView2<'a, f32>,
    labels: &'a [usize],
    n_classes: usize,
    nodes: Vec<Node>,
}

impl Grower<'_> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        let mut counts = vec![0; self.n_classes];
        for &i in &indices {
            counts[self.labels[i]] += 1;
        }
        self.nodes.push(Node {
            counts,
            split: None,
        });

        let Some((feature, threshold)) = self.best_split(id, &indices, depth) else {
            return id;
        };

        let (left, right): (Vec<_>, Vec<_>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, feature]] <= threshold);

        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[id].split = Some(Split {
            feature,
            threshold,
            left,
            right,
        });

        id
    }

    fn best_split(&self, id: usize, indices: &[usize], depth: usize) -> Option<(usize, f32)> {
        let n = indices.len();
        let params = self.params;
        let node = &self.nodes[id];

        if node.gini() <= 0.0
            || n < params.min_samples_split.max(2)
            || n < 2 * params.min_samples_leaf
            || params.max_depth.is_some_and(|max| depth >= max)
        {
            return None;
        }

        let mut best: Option<(f64, usize, f32)> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..self.x.ncols() {
            let value = |i: usize| self.x[[i, feature]];
            sorted.sort_by(|&a, &b| value(a).total_cmp(&value(b)));

            let mut left = vec![0; self.n_classes];
            let mut right = node.counts.clone();

            for pos in 1..n {
                let prev = sorted[pos - 1];
                left[self.labels[prev]] += 1;
                right[self.labels[prev]] -= 1;

                if pos < params.min_samples_leaf || n - pos < params.min_samples_leaf {
                    continue;
                }

                let (lo, hi) = (value(prev), value(sorted[pos]));
                if lo.partial_cmp(&hi) != Some(Ordering::Less) {
                    continue;
                }

                let score = (pos as f64 * gini(&left, pos)
                    + (n - pos) as f64 * gini(&right, n - pos))
                    / n as f64;

                if best.is_none_or(|(best_score, ..)| score < best_score) {
                    let mut threshold = lo / 2.0 + hi / 2.0;
                    if threshold >= hi || threshold < lo {
                        threshold = lo;
                    }

                    best = Some((score, feature, threshold));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

impl Cart {
    /// Returns the maximum depth of the tree, `0` for a single leaf.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0; self.nodes.len()];
        let mut max = 0;

        for (id, node) in self.nodes.iter().enumerate() {
            if let Some(split) = node.split {
                depths[split.left] = depths[id] + 1;
                depths[split.right] = depths[id] + 1;
                max = max.max(depths[id] + 1);
            }
        }

        max
    }

    /// The total weighted impurity of the leaves.
    pub fn leaf_impurity(&self) -> f64 {
        let total = self.nodes[0].samples() as f64;

        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.split.is_none())
            .map(|(id, _)| self.risk(id, total))
            .sum()
    }

    /// The impurity of node `id` weighted by the fraction of samples that reach it.
    fn risk(&self, id: usize, total: f64) -> f64 {
        let node = &self.nodes[id];
        node.samples() as f64 / total * node.gini()
    }

    fn check_features(&self, x: ArrayView2<f32>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(TrainErr::ShapeMismatch {
                what: "tree features",
                got: x.ncols(),
                expected: self.n_features,
            });
        }

        Ok(())
    }

    /// Descends from the root, returning the reached leaf and how many nodes were visited.
    fn descend(&self, row: ArrayView1<f32>) -> (usize, usize) {
        let mut id = 0;
        let mut visited = 1;

        while let Some(split) = self.nodes[id].split {
            id = if row[split.feature] <= split.threshold {
                split.left
            } else {
                split.right
            };
            visited += 1;
        }

        (id, visited)
    }

    /// Finds the internal node with the smallest effective alpha.
    fn weakest_link(&self) -> Option<(usize, f64)> {
        let total = self.nodes[0].samples() as f64;
        let mut leaves = vec![0usize; self.nodes.len()];
        let mut branch_risk = vec![0.0; self.nodes.len()];

        for (id, node) in self.nodes.iter().enumerate().rev() {
            match node.split {
                Some(split) => {
                    leaves[id] = leaves[split.left] + leaves[split.right];
                    branch_risk[id] = branch_risk[split.left] + branch_risk[split.right];
                }
                None => {
                    leaves[id] = 1;
                    branch_risk[id] = self.risk(id, total);
                }
            }
        }

        let mut weakest: Option<(usize, f64)> = None;

        for (id, node) in self.nodes.iter().enumerate() {
            if node.split.is_none() {
                continue;
            }

            let alpha =
                ((self.risk(id, total) - branch_risk[id]) / (leaves[id] - 1) as f64).max(0.0);

            if weakest.is_none_or(|(_, min)| alpha < min) {
                weakest = Some((id, alpha));
            }
        }

        weakest
    }

    /// Turns node `id` into a leaf and drops its now unreachable descendants.
    fn collapse(&mut self, id: usize) {
        self.nodes[id].split = None;

        let mut nodes = Vec::with_capacity(self.nodes.len());
        relink(&self.nodes, 0, &mut nodes);
        self.nodes = nodes;
    }
}

fn relink(nodes: &[Node], id: usize, out: &mut Vec<Node>) -> usize {
    let new_id = out.len();
    out.push(Node {
        counts: nodes[id].counts.clone(),
        split: None,
    });

    if let Some(split) = nodes[id].split {
        let left = relink(nodes, split.left, out);
        let right = relink(nodes, split.right, out);
        out[new_id].split = Some(Split {
            left,
            right,
            ..split
        });
    }

    new_id
}

impl TreeClassifier for Cart {
    type Params = CartParams;

    fn fit(params: &CartParams, x: ArrayView2<f32>, y: ArrayView1<f32>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(TrainErr::EmptyInput {
                what: "tree samples",
            });
        }

        if y.len() != x.nrows() {
            return Err(TrainErr::ShapeMismatch {
                what: "tree labels",
                got: y.len(),
                expected: x.nrows(),
            });
        }

        let mut classes = y.to_vec();
        classes.sort_by(f32::total_cmp);
        classes.dedup_by(|a, b| a.total_cmp(b).is_eq());

        let labels: Vec<usize> = y
            .iter()
            .map(|v| {
                classes
                    .binary_search_by(|c| c.total_cmp(v))
                    .unwrap_or_default()
            })
            .collect();

        let mut grower = Grower {
            params,
            x,
            labels: &labels,
            n_classes: classes.len(),
            nodes: Vec::new(),
        };
        grower.grow((0..x.nrows()).collect(), 0);

        let tree = Self {
            classes,
            n_features: x.ncols(),
            nodes: grower.nodes,
        };

        trace!(
            nodes = tree.node_count(),
            depth = tree.depth();
            "grew decision tree"
        );

        if params.ccp_alpha > 0.0 {
            return Ok(tree.prune(params.ccp_alpha));
        }

        Ok(tree)
    }

    fn predict(&self, x: ArrayView2<f32>) -> Result<Array1<f32>> {
        self.check_features(x)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let (leaf, _) = self.descend(row);
                self.classes[self.nodes[leaf].class()]
            })
            .collect())
    }

    fn path_lengths(&self, x: ArrayView2<f32>) -> Result<Vec<usize>> {
        self.check_features(x)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| self.descend(row).1)
            .collect())
    }

    fn cost_complexity_pruning_path(&self) -> PruningPath {
        let mut tree = self.clone();
        let mut path = PruningPath {
            ccp_alphas: vec![0.0],
            impurities: vec![tree.leaf_impurity()],
        };

        while let Some((id, alpha)) = tree.weakest_link() {
            tree.collapse(id);

            let last = path.ccp_alphas.last().copied().unwrap_or_default();
            path.ccp_alphas.push(alpha.max(last));
            path.impurities.push(tree.leaf_impurity());
        }

        path
    }

    fn prune(&self, ccp_alpha: f64) -> Self {
        let mut tree = self.clone();

        while let Some((id, alpha)) = tree.weakest_link() {
            if alpha > ccp_alpha {
                break;
            }

            tree.collapse(id);
        }

        tree
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
