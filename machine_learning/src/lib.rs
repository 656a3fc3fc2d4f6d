pub mod arch;
pub mod dataset;
pub mod error;
pub mod network;
pub mod optimization;

pub use dataset::Dataset;
pub use error::{MlErr, Result};
pub use network::Network;
