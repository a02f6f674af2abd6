//! Fatal workflow errors
//!
//! Only errors that stop a workflow from starting or force it to abort live
//! here. Per-item failures inside a running batch are data in the
//! `BatchReport`, never values of this type.

use pulseops_api::{ApiError, FetchError};
use pulseops_core::ResolveError;
use thiserror::Error;

/// Errors that abort a whole workflow
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Configuration missing or malformed; detected before any remote call
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// A remote call the workflow cannot proceed without failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An identifier the workflow requires could not be resolved
    #[error("required identifier could not be resolved: {0}")]
    RequiredIdentifier(ResolveError),

    /// A collection walk the workflow depends on aborted partway
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(message.into())
    }

    /// Whether the failure was an authentication failure
    pub fn is_auth(&self) -> bool {
        matches!(self, WorkflowError::Api(ApiError::Auth(_)))
    }
}

impl From<ResolveError> for WorkflowError {
    fn from(e: ResolveError) -> Self {
        match e {
            // A failed directory walk is a fetch problem, not a lookup miss
            ResolveError::Fetch(fetch) => WorkflowError::Fetch(fetch),
            other => WorkflowError::RequiredIdentifier(other),
        }
    }
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
