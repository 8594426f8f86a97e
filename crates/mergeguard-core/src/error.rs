//! Error taxonomy.
//!
//! Only configuration errors escape the engine: they are detected at
//! startup and the process refuses to serve. Every other failure kind is
//! contained inside the evaluation of the file it struck and resurfaces
//! as a `manual_review` reason.

use std::path::PathBuf;

use thiserror::Error;

/// Startup-time configuration failures. Fatal: the host must not serve.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("duplicate file rule name '{name}'")]
    DuplicateFileRule { name: String },

    #[error("duplicate section '{section}' in file rule '{file_rule}'")]
    DuplicateSection { file_rule: String, section: String },

    #[error("file rule '{name}' has no sections and no default_action")]
    MissingDefaultAction { name: String },

    #[error("invalid glob '{pattern}' in file rule '{file_rule}': {message}")]
    InvalidGlob {
        file_rule: String,
        pattern: String,
        message: String,
    },

    #[error(
        "file rules '{first}' and '{second}' declare identical globs; the second can never match"
    )]
    ShadowedFileRule { first: String, second: String },

    #[error("unknown rule '{rule}' referenced by section '{section}' of file rule '{file_rule}'")]
    UnknownRule {
        file_rule: String,
        section: String,
        rule: String,
    },
}

/// Failures raised by the change-set fetcher facade.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport, authorisation, or not-found failure after the facade's
    /// own retries are exhausted.
    #[error("fetch failed: {0}")]
    Failed(String),

    /// The requested revision does not contain the file.
    #[error("file not found: {path} at {revision}")]
    NotFound { path: String, revision: String },

    /// The evaluation deadline expired while the call was in flight.
    #[error("deadline exceeded")]
    Timeout,
}

pub type FetchResult<T> = Result<T, FetchError>;
