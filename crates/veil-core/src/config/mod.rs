pub mod defaults;
pub mod loading;
pub mod types;
pub mod validation;

pub use types::{Config, RegistryConfig, RetryConfig, TrackerConfig, VeilConfig};
