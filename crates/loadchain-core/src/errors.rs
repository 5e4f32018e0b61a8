use thiserror::Error;

/// Errors raised while composing stage chains
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Malformed parallelism or dependency-spec input. Raised before any
    /// file is processed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unsupported file kind: {0}")]
    UnsupportedFileKind(String),

    /// A transformation or checking engine reported its own failure
    #[error("{tool} failed: {message}")]
    UpstreamTooling { tool: String, message: String },

    #[error("Configuration file error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposeError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ComposeError::InvalidConfiguration(message.into())
    }

    pub fn upstream(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ComposeError::UpstreamTooling {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// True for errors that stop composition before any file is seen
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ComposeError::InvalidConfiguration(_) | ComposeError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ComposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display() {
        let err = ComposeError::upstream("type-check", "2 type errors");
        assert_eq!(err.to_string(), "type-check failed: 2 type errors");
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_invalid_is_configuration_error() {
        assert!(ComposeError::invalid("parallel: 0").is_configuration_error());
    }
}
