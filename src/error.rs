//! Crate error types — explicit enum variants, no `anyhow`.
//!
//! Validation and cycle errors abort before any control-plane call.
//! Provider errors are surfaced verbatim; the engine never retries.

use std::fmt;

use thiserror::Error;

/// A single validation finding against a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Resource id the finding is attached to, if any.
    pub resource: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn stack(message: impl Into<String>) -> Self {
        Self {
            resource: None,
            message: message.into(),
        }
    }

    pub fn resource(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: Some(id.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(id) => write!(f, "resource '{}': {}", id, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Top-level error type for the engine.
#[derive(Debug, Error)]
pub enum LanzarError {
    /// Descriptor assembly failed. Nothing was applied.
    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// The reference graph has no valid application order.
    #[error("dependency cycle detected involving: {}", .members.join(", "))]
    Cycle { members: Vec<String> },

    /// Control-plane failure, surfaced verbatim. Re-run to recover.
    #[error("provider error on '{resource}': {message}")]
    Provider { resource: String, message: String },

    /// One or more resources failed to converge during apply.
    #[error("{failed} resource(s) failed to converge")]
    ApplyFailed { failed: u32 },

    /// Drift findings in strict mode.
    #[error("{findings} drift finding(s)")]
    Drift { findings: usize },

    #[error("template error: {0}")]
    Template(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LanzarError {
    /// Wrap an io error with a human-readable context line.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn provider(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LanzarError>;
