mod config;
mod error;
mod raw;

pub use config::{
    CloudConfig, ControlConfig, DebugConfig, EntitiesConfig, OperationClass, RestThrottle,
    RetryCounts, Secret, TimeLimits, VcdConfig,
};
pub use error::ConfigError;

pub type Result<T> = std::result::Result<T, ConfigError>;
