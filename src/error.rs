//! Error types for the streaming diagram pipeline.

/// Top-level error type for the render pipeline and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Tool input could not be decoded (beyond what partial recovery absorbs).
    #[error("parse error: {0}")]
    Parse(String),

    /// A reserved directive carried malformed fields.
    #[error("classify error: {0}")]
    Classify(String),

    /// Raw shorthand elements could not be converted to native form.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The export capability rejected the scene.
    #[error("export error: {0}")]
    Export(String),

    /// Checkpoint store read/write error.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// A host call (display mode, server tool, link) was rejected.
    #[error("host error: {0}")]
    Host(String),

    /// The host never connected or the connection could not be established.
    #[error("connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Display-mode transition error.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

impl StreamError {
    /// Whether the error is absorbed at the boundary where it occurs.
    ///
    /// Only connection establishment and configuration failures reach the
    /// user; everything else is logged and the current cycle is abandoned.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Connection(_) | Self::Config(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_subsystem_prefix() {
        let err = StreamError::Export("line needs two points".into());
        assert_eq!(err.to_string(), "export error: line needs two points");
    }

    #[test]
    fn only_connection_and_config_are_unrecoverable() {
        assert!(!StreamError::Connection("no host".into()).is_recoverable());
        assert!(!StreamError::Config("bad ttl".into()).is_recoverable());
        assert!(StreamError::Export("x".into()).is_recoverable());
        assert!(StreamError::Checkpoint("x".into()).is_recoverable());
        assert!(StreamError::Host("x".into()).is_recoverable());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StreamError = io.into();
        assert!(matches!(err, StreamError::Io(_)));
    }
}
