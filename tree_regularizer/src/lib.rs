pub mod augment;
pub mod complexity;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod loss;
pub mod metrics;
pub mod scheduler;
pub mod surrogate;
pub mod tree;

pub use augment::{Augmentation, DataAugmentor};
pub use complexity::{ComplexityEstimator, ComplexityObservation};
pub use config::TrainingConfig;
pub use context::TrainingContext;
pub use error::{Result, TrainErr};
pub use loss::TreeRegularizedLoss;
pub use scheduler::{Scheduler, TrainingMode};
pub use surrogate::{SurrogateRegressor, SurrogateStart, SurrogateTrainer};
