use thiserror::Error;

/// Message shown when the backend rejects a write without saying why
pub const GENERIC_FAILURE: &str = "The operation could not be completed. Please try again.";

/// A single failed form field, reported before any request is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur when reading from or writing to the sheet
#[derive(Debug, Error)]
pub enum SheetError {
    /// The network call itself failed (DNS, offline, timeout, HTTP failure)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The read endpoint returned a body that could not be extracted or parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The write endpoint explicitly reported failure
    #[error("Application error: {0}")]
    Application(String),

    /// Local form validation failed; nothing was sent
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// Configuration error (missing env vars, bad layouts, column map mismatch)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session or export file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`SheetError`], cheap to copy into view state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    MalformedResponse,
    Application,
    Validation,
    Config,
    Io,
}

impl SheetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SheetError::Transport(_) => ErrorKind::Transport,
            SheetError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            SheetError::Application(_) => ErrorKind::Application,
            SheetError::Validation(_) => ErrorKind::Validation,
            SheetError::Config(_) => ErrorKind::Config,
            SheetError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<reqwest::Error> for SheetError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SheetError::Transport(format!("request timed out: {}", e))
        } else {
            SheetError::Transport(e.to_string())
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Type alias for Results using SheetError
pub type Result<T> = std::result::Result<T, SheetError>;
