pub mod controller;
pub mod handler;

pub use controller::RatingController;
pub use handler::RatingHandler;
