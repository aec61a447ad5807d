use thiserror::Error;

use crate::shapes::Formation;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("unknown parameter {0:?}")]
    UnknownName(String),
    #[error("invalid value {value:?} for parameter {name}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    /// A generator produced the wrong number of points. Never truncated or padded.
    #[error("{formation} generator returned {actual} points, expected {expected}")]
    BufferLength {
        formation: Formation,
        expected: usize,
        actual: usize,
    },
    #[error("renderer failed: {0}")]
    Render(String),
}
