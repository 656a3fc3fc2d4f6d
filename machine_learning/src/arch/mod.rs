pub mod activations;
pub mod init;
pub mod layers;
pub mod loss;
mod model;
mod sequential;

pub use model::Model;
pub use sequential::Sequential;
