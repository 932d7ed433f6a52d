pub mod error;
pub mod metadata;
pub mod movie;
pub mod rating;

pub use error::ServiceError;

/// 注册表中使用的逻辑服务名
pub const METADATA_SERVICE: &str = "metadata";
pub const RATING_SERVICE: &str = "rating";
pub const MOVIE_SERVICE: &str = "movie";
