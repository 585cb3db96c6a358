//! Error types for concord.

use thiserror::Error;

/// Unified error type for all concord operations.
///
/// Provides structured, actionable error messages with context.
#[derive(Error, Debug)]
pub enum ConcordError {
    /// Caller-supplied arguments violate a precondition (zero dimension,
    /// buffer length mismatch, negative label)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// GPU-related errors (CUDA context, NVRTC compilation, kernel launch,
    /// synchronization). Carries the low-level diagnostic.
    #[error("GPU error in {context}: {message}")]
    Gpu { context: String, message: String },

    /// Per-group scratch footprint (or launch grid) exceeds a device limit
    #[error("Resource exceeded: {0}")]
    ResourceExceeded(String),
}

impl ConcordError {
    /// Creates an input validation error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ConcordError::InvalidInput(message.into())
    }

    /// Creates a GPU error with context.
    pub fn gpu(context: impl Into<String>, message: impl Into<String>) -> Self {
        ConcordError::Gpu {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Creates a resource exceeded error.
    pub fn resource_exceeded(message: impl Into<String>) -> Self {
        ConcordError::ResourceExceeded(message.into())
    }

    /// Returns a user-friendly error message with actionable guidance.
    pub fn user_message(&self) -> String {
        match self {
            ConcordError::InvalidInput(msg) => {
                format!(
                    "Invalid input: {}\n\
                     → Check tensor dimensions (all strictly positive) and buffer length.\n\
                     → Labels must be non-negative integers.",
                    msg
                )
            }
            ConcordError::Gpu { context, message } => {
                format!(
                    "GPU error in {}: {}\n\
                     → Check CUDA installation and GPU availability.",
                    context, message
                )
            }
            ConcordError::ResourceExceeded(msg) => {
                format!(
                    "Resource exceeded: {}\n\
                     → Relabel partitions densely from 0 to shrink the label alphabet.",
                    msg
                )
            }
        }
    }
}

/// Result type alias for concord operations.
pub type Result<T> = std::result::Result<T, ConcordError>;
