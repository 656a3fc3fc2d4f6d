#![allow(dead_code)]

use machine_learning::{Dataset, Network};
use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};

use tree_regularizer::{TrainingConfig, TrainingContext, config::TreeConfig};

/// Points in the unit square labeled by whether they lie above a parabola.
pub fn parabola(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(n * 3);

    for _ in 0..n {
        let x: f32 = rng.random_range(0.0..1.0);
        let y: f32 = rng.random_range(0.0..1.0);
        let label = if y > 4.0 * (x - 0.5).powi(2) + 0.2 { 1.0 } else { 0.0 };
        values.extend([x, y, label]);
    }

    Dataset::new(values, 2, 1).unwrap()
}

/// A tiny, fast run: 12 epochs, a retrain every 5 observations.
pub fn small_config() -> TrainingConfig {
    TrainingConfig {
        epochs: 12,
        batch_size: 16,
        surrogate_interval: 5,
        regularization_strength: 1e-2,
        learning_rate: 1e-2,
        surrogate_learning_rate: 1e-2,
        surrogate_threshold: 0.0,
        surrogate_max_iters: 20,
        surrogate_hidden: 4,
        hidden: vec![4],
        tree: TreeConfig::default(),
        seed: 7,
        ..Default::default()
    }
}

/// Builds a context, its primary network and a training set doubling as reference set.
pub fn setup(config: TrainingConfig) -> (TrainingContext, Network, Dataset, Array2<f32>) {
    let ctx = TrainingContext::new(config).unwrap();
    let train = parabola(60, 3);
    let network = ctx.build_network(2, &mut StdRng::seed_from_u64(11)).unwrap();
    let x_reference = train.x().to_owned();

    (ctx, network, train, x_reference)
}
