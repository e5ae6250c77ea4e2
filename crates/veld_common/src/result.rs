//! Common result and error types for internal failures.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an unrecoverable internal error (a bug in Veld), not a
/// user-facing problem. User errors are reported as diagnostics through
/// the sink in `veld_diagnostics`.
pub type VeldResult<T> = Result<T, InternalError>;

/// An internal compiler error indicating a bug in Veld.
///
/// These should never occur during normal operation; one firing means
/// there is a logic error in the elaborator.
#[derive(Debug, thiserror::Error)]
#[error("internal compiler error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("scope stack underflow");
        assert_eq!(
            format!("{err}"),
            "internal compiler error: scope stack underflow"
        );
    }

    #[test]
    fn from_string() {
        let err: InternalError = "bad node".to_string().into();
        assert_eq!(err.message, "bad node");
    }

    #[test]
    fn result_paths() {
        let ok: VeldResult<u32> = Ok(1);
        assert!(ok.is_ok());
        let err: VeldResult<u32> = Err(InternalError::new("boom"));
        assert!(err.is_err());
    }
}
