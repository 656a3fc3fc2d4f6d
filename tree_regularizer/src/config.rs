use std::{fs, num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    augment::Augmentation,
    error::{Result, TrainErr},
    surrogate::SurrogateStart,
};

/// Whether the surrogate retrain pass takes up one of the configured epochs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainBudget {
    /// The retrain runs right after the epoch that fills the buffer, on top of the epoch count.
    #[default]
    Additional,
    /// The retrain runs on its own epoch index.
    Counted,
}

/// Activation of the primary network's hidden layers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnConfig {
    Sigmoid,
    #[default]
    Relu,
}

/// Post-pruning applied to the decision trees the complexity is measured on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pruning {
    #[default]
    None,
    /// Minimal cost-complexity pruning with a fixed alpha.
    Alpha { ccp_alpha: f64 },
    /// The alpha is chosen by k-fold cross validation over the pruning path.
    CrossValidated { folds: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
    pub pruning: Pruning,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            min_samples_leaf: 1,
            max_depth: None,
            pruning: Pruning::None,
        }
    }
}

/// Every knob of a training run. Missing fields take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Amount of observations collected between surrogate retrains.
    pub surrogate_interval: usize,
    pub regularization_strength: f32,
    pub learning_rate: f32,
    pub surrogate_learning_rate: f32,
    /// The surrogate fit stops as soon as its loss goes below this value.
    pub surrogate_threshold: f32,
    pub surrogate_start: SurrogateStart,
    pub surrogate_max_iters: usize,
    pub surrogate_hidden: usize,
    pub retrain_budget: RetrainBudget,
    pub augmentation: Augmentation,
    /// Sizes of the primary network's hidden layers.
    pub hidden: Vec<usize>,
    pub act_fn: ActFnConfig,
    pub tree: TreeConfig,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 250,
            batch_size: 100,
            surrogate_interval: 25,
            regularization_strength: 1e-3,
            learning_rate: 1e-3,
            surrogate_learning_rate: 1e-2,
            surrogate_threshold: 0.2,
            surrogate_start: SurrogateStart::Retrain,
            surrogate_max_iters: 1000,
            surrogate_hidden: 25,
            retrain_budget: RetrainBudget::Additional,
            augmentation: Augmentation::None,
            hidden: vec![16, 16],
            act_fn: ActFnConfig::Relu,
            tree: TreeConfig::default(),
            test_fraction: 0.33,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Parses and validates a JSON config.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the JSON config at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Checks every field is within its valid range.
    ///
    /// # Returns
    /// `TrainErr::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(TrainErr::Config(msg.to_string()));

        if self.epochs == 0 {
            return fail("epochs must be positive");
        }
        if self.batch_size == 0 {
            return fail("batch_size must be positive");
        }
        if self.surrogate_interval < 2 {
            return fail("surrogate_interval must be at least 2");
        }
        if !self.regularization_strength.is_finite() || self.regularization_strength < 0.0 {
            return fail("regularization_strength must be finite and non negative");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return fail("learning_rate must be positive");
        }
        if !(self.surrogate_learning_rate.is_finite() && self.surrogate_learning_rate > 0.0) {
            return fail("surrogate_learning_rate must be positive");
        }
        if !self.surrogate_threshold.is_finite() || self.surrogate_threshold < 0.0 {
            return fail("surrogate_threshold must be finite and non negative");
        }
        if self.surrogate_max_iters == 0 {
            return fail("surrogate_max_iters must be positive");
        }
        if self.surrogate_hidden == 0 {
            return fail("surrogate_hidden must be positive");
        }
        if self.hidden.contains(&0) {
            return fail("hidden layer sizes must be positive");
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return fail("test_fraction must be in (0, 1)");
        }
        if self.tree.min_samples_leaf == 0 {
            return fail("tree.min_samples_leaf must be positive");
        }
        if self.tree.max_depth == Some(0) {
            return fail("tree.max_depth must be positive");
        }

        match self.tree.pruning {
            Pruning::Alpha { ccp_alpha } if !ccp_alpha.is_finite() || ccp_alpha < 0.0 => {
                return fail("tree.pruning.ccp_alpha must be finite and non negative");
            }
            Pruning::CrossValidated { folds } if folds < 2 => {
                return fail("tree.pruning.folds must be at least 2");
            }
            _ => {}
        }

        self.augmentation.validate()
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.batch_size).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = TrainingConfig::from_json("{}").unwrap();

        assert_eq!(config, TrainingConfig::default());
        assert_eq!(config.epochs, 250);
        assert_eq!(config.surrogate_interval, 25);
        assert_eq!(config.retrain_budget, RetrainBudget::Additional);
        assert_eq!(config.surrogate_start, SurrogateStart::Retrain);
    }

    #[test]
    fn nested_fields_are_parsed() {
        let config = TrainingConfig::from_json(
            r#"{
                "epochs": 12,
                "surrogate_interval": 5,
                "surrogate_start": "warm_start",
                "retrain_budget": "counted",
                "augmentation": { "kind": "dirichlet", "synth_count": 7 },
                "tree": { "max_depth": 4, "pruning": { "mode": "cross_validated", "folds": 5 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.epochs, 12);
        assert_eq!(config.surrogate_start, SurrogateStart::WarmStart);
        assert_eq!(config.retrain_budget, RetrainBudget::Counted);
        assert_eq!(
            config.augmentation,
            Augmentation::Dirichlet {
                synth_count: 7,
                subset: None
            }
        );
        assert_eq!(config.tree.max_depth, Some(4));
        assert_eq!(config.tree.min_samples_leaf, 1);
        assert_eq!(config.tree.pruning, Pruning::CrossValidated { folds: 5 });
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = TrainingConfig::from_json(r#"{ "epoch": 3 }"#).unwrap_err();
        assert!(matches!(err, TrainErr::Config(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases = [
            r#"{ "epochs": 0 }"#,
            r#"{ "batch_size": 0 }"#,
            r#"{ "surrogate_interval": 1 }"#,
            r#"{ "regularization_strength": -0.1 }"#,
            r#"{ "learning_rate": 0.0 }"#,
            r#"{ "surrogate_threshold": -1.0 }"#,
            r#"{ "surrogate_hidden": 0 }"#,
            r#"{ "test_fraction": 1.0 }"#,
            r#"{ "hidden": [4, 0] }"#,
            r#"{ "tree": { "pruning": { "mode": "cross_validated", "folds": 1 } } }"#,
            r#"{ "augmentation": { "kind": "gaussian", "synth_count": 3, "scale": -0.5 } }"#,
        ];

        for case in cases {
            let err = TrainingConfig::from_json(case).unwrap_err();
            assert!(matches!(err, TrainErr::Config(_)), "{case} gave {err}");
        }
    }

    #[test]
    fn zero_strength_is_valid() {
        let config = TrainingConfig::from_json(r#"{ "regularization_strength": 0.0 }"#).unwrap();
        assert_eq!(config.regularization_strength, 0.0);
    }
}
