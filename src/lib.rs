//! On-demand video thumbnails.
//!
//! The service lives in `thumbnail-service`; domain types shared with other
//! tools live in `common`.

pub use common;
pub use thumbnail_service;
