use log::debug;
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::{Rng, seq::SliceRandom};

use super::{Cart, CartParams, TreeClassifier};
use crate::error::Result;

/// Picks a post-pruning alpha by k-fold cross validation.
///
/// The candidates are the alphas of the full tree's pruning path except the last one, which
/// would prune it down to its root. Each candidate is scored by the mean, over the folds, of
/// the squared error between the pruned fold tree's predictions and the held out labels.
/// The largest alpha whose score is within one standard deviation of the best score wins.
///
/// # Arguments
/// * `params` - The growth parameters, its `ccp_alpha` is ignored.
/// * `x` - The samples.
/// * `y` - Their labels.
/// * `folds` - The amount of folds, clamped to the amount of samples.
/// * `rng` - Shuffles the samples before splitting them into folds.
///
/// # Returns
/// The selected alpha, `0` when the path has no candidates or there are too few samples.
pub fn select_ccp_alpha<R: Rng>(
    params: &CartParams,
    x: ArrayView2<f32>,
    y: ArrayView1<f32>,
    folds: usize,
    rng: &mut R,
) -> Result<f64> {
    let params = CartParams {
        ccp_alpha: 0.0,
        ..*params
    };

    let tree = Cart::fit(&params, x, y)?;
    let mut alphas = tree.cost_complexity_pruning_path().ccp_alphas;
    alphas.pop();

    let k = folds.min(x.nrows());
    if alphas.is_empty() || k < 2 {
        return Ok(0.0);
    }

    let mut order: Vec<usize> = (0..x.nrows()).collect();
    order.shuffle(rng);

    let mut fold_trees = Vec::with_capacity(k);
    for fold in 0..k {
        let (train, test) = split_fold(&order, fold, k);
        let fold_tree = Cart::fit(
            &params,
            x.select(Axis(0), &train).view(),
            y.select(Axis(0), &train).view(),
        )?;
        fold_trees.push((fold_tree, test));
    }

    let mut scores = Vec::with_capacity(alphas.len());
    for &alpha in &alphas {
        let mut total = 0.0;

        for (fold_tree, test) in &fold_trees {
            let pruned = fold_tree.prune(alpha);
            let x_test = x.select(Axis(0), test);
            let y_test = y.select(Axis(0), test);
            let y_pred = pruned.predict(x_test.view())?;

            total += (&y_pred - &y_test)
                .mapv(|e| (e as f64).powi(2))
                .mean()
                .unwrap_or_default();
        }

        scores.push(total / k as f64);
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let std = (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64).sqrt();

    let selected = alphas
        .iter()
        .zip(&scores)
        .filter(|&(_, &score)| score <= min + std)
        .map(|(&alpha, _)| alpha)
        .fold(0.0, f64::max);

    debug!(
        candidates = alphas.len(),
        min_mse = min,
        selected = selected;
        "selected pruning alpha"
    );

    Ok(selected)
}

/// Splits `order` into `k` contiguous folds, returning the training and test indices of `fold`.
fn split_fold(order: &[usize], fold: usize, k: usize) -> (Vec<usize>, Vec<usize>) {
    let n = order.len();
    let start = fold * n / k;
    let end = (fold + 1) * n / k;

    let test = order[start..end].to_vec();
    let train = order[..start]
        .iter()
        .chain(&order[end..])
        .copied()
        .collect();

    (train, test)
}
