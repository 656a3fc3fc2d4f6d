use log::debug;
use machine_learning::{MlErr, Network};
use ndarray::ArrayView2;
use rand::{Rng, seq::index};
use rand_distr::{Distribution, Gamma, Normal};
use serde::{Deserialize, Serialize};

use crate::{
    complexity::{ComplexityEstimator, ComplexityObservation},
    error::{Result, TrainErr},
};

fn default_scale() -> f32 {
    0.1
}

/// How to synthesize extra observations for the surrogate between retrains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Augmentation {
    #[default]
    None,
    /// Random convex mixtures of the observed parameter vectors, with symmetric Dirichlet(1)
    /// weights over every observation or over a random `subset` of them.
    Dirichlet {
        synth_count: usize,
        #[serde(default)]
        subset: Option<usize>,
    },
    /// An observed parameter vector with every entry perturbed by `N(θ, scale·|θ|)`.
    Gaussian {
        synth_count: usize,
        #[serde(default = "default_scale")]
        scale: f32,
    },
}

impl Augmentation {
    /// Returns the amount of synthetic observations produced per retrain.
    pub fn synth_count(&self) -> usize {
        match *self {
            Augmentation::None => 0,
            Augmentation::Dirichlet { synth_count, .. } => synth_count,
            Augmentation::Gaussian { synth_count, .. } => synth_count,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Augmentation::Dirichlet { subset: Some(k), .. } if k < 2 => Err(TrainErr::Config(
                "augmentation.subset must be at least 2".to_string(),
            )),
            Augmentation::Gaussian { scale, .. } if !scale.is_finite() || scale < 0.0 => Err(
                TrainErr::Config("augmentation.scale must be finite and non negative".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Draws symmetric Dirichlet(1) weights over `k` components: `k` non negative values that
/// sum to one.
pub fn dirichlet_weights<R: Rng>(k: usize, rng: &mut R) -> Result<Vec<f32>> {
    let gamma = Gamma::new(1.0f32, 1.0)
        .map_err(|_| MlErr::InvalidInput("gamma distribution is invalid"))?;

    let mut weights: Vec<f32> = gamma.sample_iter(rng).take(k).collect();
    let total: f32 = weights.iter().sum();

    if total > 0.0 && total.is_finite() {
        weights.iter_mut().for_each(|w| *w /= total);
    } else {
        weights.fill(1.0 / k as f32);
    }

    Ok(weights)
}

/// Enlarges a surrogate training set with synthetic observations.
///
/// Every synthetic vector is measured on a disposable probe of the primary network, which is
/// itself never written.
#[derive(Debug, Clone)]
pub struct DataAugmentor {
    strategy: Augmentation,
}

impl DataAugmentor {
    pub fn new(strategy: Augmentation) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> Augmentation {
        self.strategy
    }

    /// Synthesizes new observations from `observations`.
    ///
    /// # Arguments
    /// * `observations` - The observed parameter vectors and their complexities.
    /// * `primary` - The network the vectors belong to, only used to build probes from.
    /// * `estimator` - Measures the complexity of every synthetic vector.
    /// * `x_reference` - The samples complexities are measured on.
    /// * `rng` - The random number generator to draw from.
    ///
    /// # Returns
    /// Only the synthetic observations, `synth_count` of them.
    pub fn augment<R: Rng>(
        &self,
        observations: &[ComplexityObservation],
        primary: &Network,
        estimator: &ComplexityEstimator,
        x_reference: ArrayView2<f32>,
        rng: &mut R,
    ) -> Result<Vec<ComplexityObservation>> {
        let synth_count = self.strategy.synth_count();
        if synth_count == 0 {
            return Ok(Vec::new());
        }

        if observations.is_empty() {
            return Err(TrainErr::EmptyInput {
                what: "observations",
            });
        }

        let mut synthetic = Vec::with_capacity(synth_count);

        for _ in 0..synth_count {
            let params = match self.strategy {
                Augmentation::None => break,
                Augmentation::Dirichlet { subset, .. } => mix(observations, subset, rng)?,
                Augmentation::Gaussian { scale, .. } => {
                    let source = &observations[rng.random_range(0..observations.len())];
                    perturb(&source.params, scale, rng)?
                }
            };

            let probe = primary.probe(&params)?;
            let apl = estimator.average_path_length(&probe, x_reference)?;
            synthetic.push(ComplexityObservation { params, apl });
        }

        debug!(
            observed = observations.len(),
            synthesized = synthetic.len();
            "augmented surrogate observations"
        );

        Ok(synthetic)
    }
}

fn mix<R: Rng>(
    observations: &[ComplexityObservation],
    subset: Option<usize>,
    rng: &mut R,
) -> Result<Vec<f32>> {
    let n = observations.len();
    let chosen: Vec<usize> = match subset {
        Some(k) if k < n => index::sample(rng, n, k).into_vec(),
        _ => (0..n).collect(),
    };

    let weights = dirichlet_weights(chosen.len(), rng)?;
    let mut mixed = vec![0.0; observations[0].params.len()];

    for (&i, w) in chosen.iter().zip(weights) {
        let params = &observations[i].params;
        if params.len() != mixed.len() {
            return Err(TrainErr::ShapeMismatch {
                what: "observation parameters",
                got: params.len(),
                expected: mixed.len(),
            });
        }

        for (m, p) in mixed.iter_mut().zip(params) {
            *m += w * p;
        }
    }

    Ok(mixed)
}

fn perturb<R: Rng>(params: &[f32], scale: f32, rng: &mut R) -> Result<Vec<f32>> {
    params
        .iter()
        .map(|&p| -> Result<f32> {
            let normal = Normal::new(p, scale * p.abs())
                .map_err(|_| MlErr::InvalidInput("parameter perturbation is not finite"))?;
            Ok(normal.sample(rng))
        })
        .collect()
}
