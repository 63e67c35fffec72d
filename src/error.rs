use crate::asset::Category;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssemblyError>;

/// Everything that can abort an assembly. No variant is retried internally.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("no {category} asset available: {reason}")]
    NotFound { category: Category, reason: String },

    #[error("cannot decode '{}': {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("background is {actual_ms} ms long, at least {required_ms} ms required")]
    InsufficientDuration { actual_ms: u64, required_ms: u64 },

    #[error("no main sections available to place on the timeline")]
    NoContent,

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding '{}' failed: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },
}

impl AssemblyError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssemblyError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AssemblyError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable tag used by callers that translate failures into transport codes.
    pub fn kind(&self) -> &'static str {
        match self {
            AssemblyError::NotFound { .. } => "not_found",
            AssemblyError::Decode { .. } => "decode",
            AssemblyError::InsufficientDuration { .. } => "insufficient_duration",
            AssemblyError::NoContent => "no_content",
            AssemblyError::Io { .. } | AssemblyError::Encode { .. } => "io",
        }
    }

    /// The result could not be written to its destination.
    pub fn is_io(&self) -> bool {
        matches!(self, AssemblyError::Io { .. } | AssemblyError::Encode { .. })
    }
}
