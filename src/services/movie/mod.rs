pub mod controller;
pub mod handler;

pub use controller::{MetadataSource, MovieController, RatingSource};
pub use handler::MovieHandler;
