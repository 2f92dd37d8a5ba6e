pub mod analytics;
pub mod assistant;
pub mod board;
pub mod model;

pub use model::*;
