use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur while a
/// mapping session is edited, validated, or pushed to the remote service.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading session or snapshot files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a source snapshot does not carry an identifier column.
    #[error("\"ID\" column not found in {0}, choose another file")]
    MissingIdentifierColumn(String),

    /// Raised when an operation names a field that is not part of the
    /// current snapshot.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// No correspondence links a left field to a right field.
    #[error("Map at least one column.")]
    NoMappings,

    /// The identifier field is not part of the linked correspondences.
    #[error("The 'ID' column must be mapped before syncing.")]
    MissingIdentifier,

    /// A remote call could not be completed.
    #[error("network error: {0}")]
    Transport(String),

    /// A remote call completed but was rejected by the service.
    #[error("{}", .message.as_deref().unwrap_or("Unknown error"))]
    Server { status: u16, message: Option<String> },

    /// Raised when the client or session configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// The task owning a shared session has stopped.
    #[error("mapping session is no longer running")]
    SessionClosed,

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl ToolError {
    /// Whether the error was detected locally, before any remote call.
    pub fn is_validation(&self) -> bool {
        matches!(self, ToolError::NoMappings | ToolError::MissingIdentifier)
    }

    /// Text surfaced to the user when a remote call fails. Transport failures
    /// carry no structured detail and map to the caller-provided fallback.
    pub fn remote_detail(&self, transport_fallback: &str) -> String {
        match self {
            ToolError::Transport(_) => transport_fallback.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(error: reqwest::Error) -> Self {
        ToolError::Transport(error.to_string())
    }
}
