//! CLI error type

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the command line tool
#[derive(Debug, Error)]
pub enum CliError {
    /// The driver rejected or failed an operation
    #[error("flash error: {0}")]
    Flash(#[from] bootflash_core::Error),

    /// The configuration file could not be loaded
    #[error("{0}")]
    Config(#[from] bootflash_core::config::ConfigError),

    /// A file could not be read or written
    #[error("Failed to access {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Progress bar template did not parse
    #[error("progress bar: {0}")]
    Progress(#[from] indicatif::style::TemplateError),

    /// The request does not fit the flash
    #[error("{0}")]
    OutOfRange(String),
}

impl CliError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }
}
