use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration at '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error")]
    JsonParse(#[from] serde_json::Error),

    #[error("invalid number of VCDs: expected exactly 1, found {count}")]
    VcdCount { count: usize },

    #[error("configuration field '{field}' must not be empty")]
    EmptyField { field: &'static str },

    #[error("invalid REST throttle: min {min} exceeds max {max}")]
    InvalidThrottle { min: f64, max: f64 },
}
