// src/error.rs

//! Error types for pessimist
//!
//! Install and test failures inside a worker are not errors: they are
//! reported as data on an [`crate::engine::Outcome`]. Everything here either
//! aborts the run before any plan is scheduled or signals a broken worker
//! pool.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or driving a run
#[derive(Error, Debug)]
pub enum Error {
    /// A version string is not valid PEP 440
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// A version specifier could not be parsed
    #[error("invalid version specifier '{0}'")]
    InvalidSpecifier(String),

    /// A requirement line could not be parsed
    #[error("invalid requirement '{input}': {reason}")]
    InvalidRequirement { input: String, reason: String },

    /// An environment marker could not be parsed
    #[error("invalid marker '{input}': {reason}")]
    InvalidMarker { input: String, reason: String },

    /// No installable version satisfies a requirement
    #[error("no versions match {0:?}; maybe pre-release only?")]
    NoMatchingVersions(String),

    /// The package index does not know the package
    #[error("package not found in index: {0}")]
    PackageNotFound(String),

    /// The package index could not be queried
    #[error("index error: {0}")]
    IndexError(String),

    /// The target interpreter could not be probed
    #[error("interpreter error: {0}")]
    InterpreterError(String),

    /// An isolated environment could not be created
    #[error("environment error: {0}")]
    EnvironmentError(String),

    /// The worker pool stopped responding or could not be started
    #[error("worker pool error: {0}")]
    WorkerError(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decoding error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
