//! Garbage collector error types.

use thiserror::Error;

/// Error codes surfaced by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The usage source could not answer for a tenant.
    LookupFailed,
    /// The tenant binary root exists but could not be listed.
    ScanFailed,
    /// Computing the size of a version directory failed.
    MeasureFailed,
    /// Recursive removal of a version directory failed.
    RemoveFailed,
    /// The pinned version set could not be produced for a cycle.
    PinnedSourceFailed,
    /// Configuration is unusable.
    InvalidConfig,
    InternalError,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::LookupFailed => "LookupFailed",
            ErrorCode::ScanFailed => "ScanFailed",
            ErrorCode::MeasureFailed => "MeasureFailed",
            ErrorCode::RemoveFailed => "RemoveFailed",
            ErrorCode::PinnedSourceFailed => "PinnedSourceFailed",
            ErrorCode::InvalidConfig => "InvalidConfig",
            ErrorCode::InternalError => "InternalError",
        }
    }

    /// Returns the default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::LookupFailed => "Failed to get used versions.",
            ErrorCode::ScanFailed => "Failed to get stored versions.",
            ErrorCode::MeasureFailed => "Failed to measure directory size.",
            ErrorCode::RemoveFailed => "Failed to remove directory.",
            ErrorCode::PinnedSourceFailed => "Failed to get pinned versions.",
            ErrorCode::InvalidConfig => "The configuration is invalid.",
            ErrorCode::InternalError => "The collector encountered an internal error.",
        }
    }
}

/// Collector error with code and message.
#[derive(Debug, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct GcError {
    pub code: ErrorCode,
    pub message: String,
}

impl GcError {
    /// Creates a new error with the given code and default message.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.default_message().to_string(),
            code,
        }
    }

    /// Creates a new error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Wraps an I/O error under the given code, keeping the path for context.
    pub fn io(code: ErrorCode, path: &std::path::Path, err: std::io::Error) -> Self {
        Self::with_message(code, format!("{}: {}", path.display(), err))
    }
}

/// Result type alias for collector operations.
pub type GcResult<T> = Result<T, GcError>;
