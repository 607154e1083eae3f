// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QitreeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown project: {0}")]
    UnknownNode(String),

    #[error("{0}")]
    DagCycle(#[from] CycleError),

    /// The harness itself broke while launching a test. Never a test failure.
    #[error("Error while launching test '{test}': {message}")]
    LaunchInfrastructure { test: String, message: String },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A dependency cycle met while visiting the graph in strict mode.
///
/// `node` is the node that was entered a second time, `parent` the node
/// whose dependency edge closed the cycle, and `path` the visit stack from
/// `node` down to `parent`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Circular dependency error: starting from '{node}', node '{parent}' depends on '{node}', complete path: {} -> {node}",
    .path.join(" -> ")
)]
pub struct CycleError {
    pub node: String,
    pub parent: String,
    pub path: Vec<String>,
}

pub type Result<T> = std::result::Result<T, QitreeError>;
