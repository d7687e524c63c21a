//! Error taxonomy for client operations.
//!
//! Every error is local to the failing call: callers surface it as a
//! structured failure and move on. Nothing here retries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Unknown flow, run, step, task, or artifact.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The backing store is unreachable or returned a server error.
    #[error("backend error: {0}")]
    Backend(String),

    /// Malformed caller input (empty identifier, bad pathspec, bad regex).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ClientError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ClientError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Short machine-readable name, used in error envelopes.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ClientError::NotFound { .. } => "NotFoundError",
            ClientError::Backend(_) => "BackendError",
            ClientError::InvalidArgument(_) => "InvalidArgumentError",
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(
            ClientError::not_found("run", "F/1").kind_name(),
            "NotFoundError"
        );
        assert_eq!(
            ClientError::Backend("down".into()).kind_name(),
            "BackendError"
        );
        assert_eq!(
            ClientError::InvalidArgument("empty".into()).kind_name(),
            "InvalidArgumentError"
        );
    }

    #[test]
    fn test_display_includes_id() {
        let err = ClientError::not_found("artifact", "F/1/end/3: model");
        assert!(err.to_string().contains("artifact not found"));
        assert!(err.to_string().contains("model"));
    }
}
