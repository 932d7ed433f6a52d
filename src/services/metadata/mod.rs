pub mod controller;
pub mod handler;

pub use controller::MetadataController;
pub use handler::MetadataHandler;
