//! Error types for the debug console

pub type Result<T> = std::result::Result<T, ConsoleError>;

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Missing or invalid route configuration
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Outbound delivery (webhook, mail, publish) failed
    #[error("Transport error ({sink}): {message}")]
    TransportError { sink: String, message: String },

    /// Formatter error with format type
    #[error("Formatter error ({format_type}): {message}")]
    FormatterError {
        format_type: String,
        message: String,
    },

    /// Serialized log data could not be decoded
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Stream route has no open handle
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ConsoleError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ConsoleError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        ConsoleError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(sink: impl Into<String>, message: impl Into<String>) -> Self {
        ConsoleError::TransportError {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a formatter error
    pub fn formatter(format_type: impl Into<String>, message: impl Into<String>) -> Self {
        ConsoleError::FormatterError {
            format_type: format_type.into(),
            message: message.into(),
        }
    }

    pub fn decode<S: Into<String>>(msg: S) -> Self {
        ConsoleError::DecodeError(msg.into())
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        ConsoleError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ConsoleError::Other(msg.into())
    }

    /// True for errors caused by missing or invalid configuration
    pub fn is_config(&self) -> bool {
        matches!(self, ConsoleError::InvalidConfiguration { .. })
    }
}
