pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod shutdown;
pub mod types;

pub use config::*;
pub use error::ClusterError;
pub use types::*;
