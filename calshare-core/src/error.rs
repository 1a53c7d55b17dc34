//! Error types for calshare.

use thiserror::Error;

/// Rejections that happen before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Nothing to generate: add at least one event")]
    NothingToGenerate,

    #[error("Event limit reached: at most {max} events per file")]
    DraftLimitReached { max: usize },

    #[error("Artifact limit reached: at most {max} generated files can be kept")]
    ArtifactLimitReached { max: usize },

    #[error("Generating calendar files requires an active subscription")]
    NotEntitled,

    #[error("Event not found: {0}")]
    DraftNotFound(String),
}

/// Errors that can occur in calshare operations.
#[derive(Error, Debug)]
pub enum CalShareError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Could not write calendar file: {0}")]
    StorageWrite(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Could not fetch remote file {reference}: {reason}")]
    Fetch { reference: String, reason: String },

    #[error("Could not delete remote file {reference}: {reason}")]
    RemoteDelete { reference: String, reason: String },

    #[error("History error: {0}")]
    History(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CalShareError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CalShareError::Validation(_))
    }
}

impl From<serde_json::Error> for CalShareError {
    fn from(e: serde_json::Error) -> Self {
        CalShareError::Serialization(e.to_string())
    }
}

/// Result type alias for calshare operations.
pub type CalShareResult<T> = Result<T, CalShareError>;
