pub mod cache_key;
pub mod fit;
pub mod thumbnail;
pub mod timespec;
pub mod validation;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
