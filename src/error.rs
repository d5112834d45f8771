//! Error handling for the location loader
//!
//! Library code returns [`LoaderError`]; the binary wraps it with anyhow
//! context for top-level reporting.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the loader
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Relationship CSV is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Location type '{0}' appears more than once in the source")]
    DuplicateLocationType(String),

    #[error("Invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Sink error: {0}")]
    Sink(String),
}

impl LoaderError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoaderError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;
