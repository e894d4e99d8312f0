//! Error type for the fallible edges of the crate.
//!
//! World queries never fail (ungenerated space is simply Air), so this only
//! covers configuration loading and worker startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn worker thread {index}: {source}")]
    WorkerSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, WorldError>;
