//! Error types for the FeatureFlag operator.

use crate::store::ObjectKey;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during operator operations.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error that is neither a 404 nor a 409.
    #[error("Kubernetes API error: {0}")]
    KubeError(#[source] kube::Error),

    /// Resource not found.
    #[error("Resource not found: {kind}/{key}")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource identity.
        key: ObjectKey,
    },

    /// Status write rejected because the resource version is stale.
    #[error("Conflict updating {key}: resource version {resource_version} is stale")]
    Conflict {
        /// Resource identity.
        key: ObjectKey,
        /// Resource version the write was based on.
        resource_version: String,
    },

    /// Resource store unavailable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Store call exceeded its deadline.
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    /// The calling context was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Resource is structurally invalid (missing namespace, resource version, ...).
    #[error("Invalid resource {key}: {reason}")]
    InvalidResource {
        /// Resource identity.
        key: ObjectKey,
        /// What is wrong with it.
        reason: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Reconciler panicked while handling a resource.
    #[error("Reconciler panicked on {key}: {message}")]
    Panicked {
        /// Resource identity.
        key: ObjectKey,
        /// Panic payload, when it was a string.
        message: String,
    },
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

/// Coarse classification used by the reconciler and `error_policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The resource vanished; nothing to do.
    NotFound,
    /// Concurrent modification; retry with a fresh read.
    Conflict,
    /// Store or network trouble; retry with backoff.
    Transient,
    /// Should not happen for a well-formed resource; logged loudly, still retried.
    Permanent,
}

impl OperatorError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Conflict { .. } => ErrorClass::Conflict,
            Self::KubeError(_) | Self::Unavailable(_) | Self::Timeout(_) | Self::Cancelled => {
                ErrorClass::Transient
            }
            Self::InvalidResource { .. }
            | Self::InvalidConfig(_)
            | Self::SerializationError(_)
            | Self::Panicked { .. } => ErrorClass::Permanent,
        }
    }

    /// Whether this error is a not-found.
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    /// Whether this error is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        self.class() == ErrorClass::Conflict
    }

    /// Map a Kubernetes API error for a specific object, splitting out 404 and 409.
    pub fn from_kube(err: kube::Error, kind: &str, key: &ObjectKey, resource_version: &str) -> Self {
        let code = match &err {
            kube::Error::Api(resp) => Some(resp.code),
            _ => None,
        };
        match code {
            Some(404) => Self::NotFound {
                kind: kind.to_string(),
                key: key.clone(),
            },
            Some(409) => Self::Conflict {
                key: key.clone(),
                resource_version: resource_version.to_string(),
            },
            _ => Self::KubeError(err),
        }
    }
}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        OperatorError::KubeError(err)
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}
