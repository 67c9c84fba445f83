// Error taxonomy
//
// Validation problems are never errors: they are returned as data inside a
// `StepValidationResult`. Navigation misuse is logged and ignored. What remains
// here is persistence, execution and contract failures.

use thiserror::Error;

/// Failures raised by a `DraftManager` implementation.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Draft not found: {0}")]
    NotFound(String),

    #[error("Draft storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Draft serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Draft archive is invalid: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Draft payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Draft storage quota exceeded (required {required} bytes, available {available} bytes)")]
    QuotaExceeded { required: u64, available: u64 },

    #[error("Draft format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Draft checksum mismatch (expected {expected}, computed {actual})")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Invalid draft data: {0}")]
    InvalidFormat(String),

    #[error("Draft backend error: {0}")]
    Backend(String),
}

/// Failures reported by an `ExecutionBackend`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Execution cancelled.")]
    Cancelled,

    #[error("{message}")]
    Failed { message: String, transient: bool },
}

impl ExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            transient: false,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            transient: true,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Failed { transient: true, .. })
    }
}

/// Errors surfaced by `WizardStore` entry points.
#[derive(Debug, Error)]
pub enum WizardError {
    #[error("Unknown form section: {0}")]
    UnknownSection(String),

    #[error("Invalid data for section '{section}': {source}")]
    InvalidSectionData {
        section: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Project cannot be executed: {0}")]
    NotReady(String),

    #[error("Form validation failed with {errors} error(s)")]
    ValidationFailed { errors: usize },

    #[error("A draft save is already in progress")]
    SaveInProgress,

    #[error("Execution cancelled.")]
    Cancelled,

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Draft belongs to flow '{found}', expected '{expected}'")]
    FlowMismatch { expected: String, found: String },

    #[error(transparent)]
    Draft(#[from] DraftError),
}

impl From<ExecutionError> for WizardError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Cancelled => WizardError::Cancelled,
            ExecutionError::Failed { message, .. } => WizardError::Execution(message),
        }
    }
}
