/// Convenience result type used across blitcore.
pub type BlitResult<T> = Result<T, BlitError>;

/// Error taxonomy for draw-task execution.
///
/// Empty clips and invisible opacity are not errors; they retire a task as skipped.
#[derive(thiserror::Error, Debug)]
pub enum BlitError {
    /// A backend cannot process the requested format/blend combination.
    ///
    /// The dispatcher reroutes the task to the software backend.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The source image could not be opened or decoded.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// Invalid caller-provided geometry, stride or buffer.
    #[error("validation error: {0}")]
    Validation(String),

    /// A driver reported a failure while executing a submission.
    #[error("hardware error: {0}")]
    Hardware(String),

    /// Invalid dispatcher or backend configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Errors from lower layers that have no dedicated variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BlitError {
    /// Build [`BlitError::UnsupportedFormat`].
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build [`BlitError::DecodeFailure`].
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeFailure(msg.into())
    }

    /// Build [`BlitError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build [`BlitError::Hardware`].
    pub fn hardware(msg: impl Into<String>) -> Self {
        Self::Hardware(msg.into())
    }

    /// Build [`BlitError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Return `true` for errors that should reroute a task instead of failing it.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
