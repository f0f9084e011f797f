pub mod api;
pub mod cache;
pub mod coalesce;
pub mod config;
pub mod engine;
pub mod error;
pub mod publisher;
pub mod s3;
pub mod scheduler;
pub mod service;
pub mod source;
pub mod state;

pub use error::{ApiError, ServiceError};
pub use service::{Origin, Thumbnail, ThumbnailService};
pub use state::AppState;
