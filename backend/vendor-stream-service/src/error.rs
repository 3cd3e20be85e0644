use std::fmt;
use thiserror::Error;

/// Failures of the persistent stream connection.
///
/// Only `Transport { resettable: true, .. }` is retried by the session; every
/// other variant, rate limits included, closes it and is surfaced to the owner.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Transport error (resettable: {resettable}): {message}")]
    Transport { resettable: bool, message: String },

    #[error("Stream authentication rejected: {0}")]
    Auth(String),

    #[error("Stream is at the maximum allowed connection limit: {0}")]
    Capacity(String),

    #[error("Stream endpoint rate limit reached: {0}")]
    RateLimited(String),

    #[error("Stream endpoint reported an error: {0}")]
    Remote(String),

    #[error("Reconnect attempts exhausted after {0} retries")]
    RetriesExhausted(u32),
}

impl StreamError {
    pub fn resettable(message: impl Into<String>) -> Self {
        StreamError::Transport {
            resettable: true,
            message: message.into(),
        }
    }

    pub fn fatal_transport(message: impl Into<String>) -> Self {
        StreamError::Transport {
            resettable: false,
            message: message.into(),
        }
    }

    pub fn is_resettable(&self) -> bool {
        matches!(self, StreamError::Transport { resettable: true, .. })
    }
}

/// A single wire frame that could not be decoded. Recoverable: the frame is skipped.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Unrecognised frame shape: {0}")]
    UnknownShape(String),

    #[error("Frame exceeds {limit} bytes without a delimiter")]
    Oversized { limit: usize },
}

/// Step of a rule synchronization that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Fetch,
    Delete,
    Add,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStage::Fetch => write!(f, "fetch"),
            SyncStage::Delete => write!(f, "delete"),
            SyncStage::Add => write!(f, "add"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Rule sync failed during {stage} (status: {status:?}): {message}")]
    SyncFailed {
        stage: SyncStage,
        status: Option<u16>,
        message: String,
    },
}

impl SyncError {
    pub fn failed(stage: SyncStage, status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::SyncFailed {
            stage,
            status,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> SyncStage {
        match self {
            SyncError::SyncFailed { stage, .. } => *stage,
        }
    }

    /// Network failures, throttling and server errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::SyncFailed { status: None, .. } => true,
            SyncError::SyncFailed {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Subject id {id:?} does not fit in a rule of at most {budget} characters")]
    IdTooLong { id: String, budget: usize },

    #[error("Subject id {0:?} contains characters not allowed in a rule operator")]
    InvalidId(String),

    #[error("{needed} rules required but at most {max} are allowed")]
    TooManyRules { needed: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Page size must be positive")]
    InvalidPageSize,

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Scan transport error: {0}")]
    Transport(String),

    #[error("Failed to deserialize scanned item: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// Raw event payload that cannot be turned into a canonical record.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("Event has no included user")]
    MissingSubject,

    #[error("Event has no tweet content")]
    MissingContent,

    #[error("Event has no included place")]
    MissingPlace,

    #[error("Place {0} has no usable bounding box")]
    InvalidGeometry(String),
}

#[derive(Debug, Error)]
pub enum StoreWriteError {
    #[error("Store write failed for key {key}: {message}")]
    Write { key: String, message: String },

    #[error("Record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum QueuePublishError {
    #[error("Queue publish to {destination} failed: {message}")]
    Send {
        destination: String,
        message: String,
    },

    #[error("Record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure of the startup sequence that installs the vendor rules.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to read vendors: {0}")]
    Scan(#[from] ScanError),

    #[error("Failed to compile rules: {0}")]
    Rules(#[from] RuleError),

    #[error("Failed to synchronize rules: {0}")]
    Sync(#[from] SyncError),
}
