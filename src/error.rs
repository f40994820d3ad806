//! Error taxonomy.
//!
//! Each stage has its own enum; [`Error`] unifies them for callers of
//! [`crate::service::PlateService`]. Library errors (HTTP, JSON, image and FITS codecs)
//! are translated at the stage boundary and never surface raw.

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::export::FitsWriteError;
use crate::types::{InvalidPlateId, PlateId};

// ============================================================================
// Metadata derivation
// ============================================================================

/// A catalog or site lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("OBJECT incorrect: '{object}' was not found in the catalog")]
    ObjectNotFound { object: String },

    #[error("observatory '{site}' is not in the site database")]
    UnknownSite { site: String },

    #[error("catalog {catalog} unavailable: {reason}")]
    CatalogUnavailable { catalog: String, reason: String },

    #[error("catalog {catalog} did not answer within {seconds}s")]
    Timeout { catalog: String, seconds: u64 },
}

/// An operator-entered field does not have the expected layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} incorrect: '{value}' (expected {expected})")]
pub struct FormatError {
    pub field: String,
    pub value: String,
    pub expected: &'static str,
}

/// Fatal outcome of a metadata derivation run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeriveError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

// ============================================================================
// Export validation
// ============================================================================

/// Which validation gate an issue comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    EmptyBatch,
    MissingIdentifier,
    NonAscii,
    IllegalCharacter,
    DuplicateIdentifier,
    InvalidKeyword,
}

impl std::fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::EmptyBatch => "no objects to export",
            Self::MissingIdentifier => "missing primary identifier",
            Self::NonAscii => "non-ASCII value",
            Self::IllegalCharacter => "illegal filename character",
            Self::DuplicateIdentifier => "duplicate identifier and suffix",
            Self::InvalidKeyword => "invalid header keyword",
        };
        f.write_str(text)
    }
}

/// One failed gate: the rule and the offending field or object.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    pub rule: ValidationRule,
    pub subject: String,
}

impl ValidationIssue {
    pub fn new(rule: ValidationRule, subject: impl Into<String>) -> Self {
        Self {
            rule,
            subject: subject.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.rule, self.subject)
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no working record for plate {0}")]
    NoWorkingRecord(PlateId),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

// ============================================================================
// Export
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("{context}: {source}")]
    Image {
        context: String,
        #[source]
        source: image::ImageError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Fits {
        context: String,
        #[source]
        source: FitsWriteError,
    },

    #[error("export cancelled")]
    Cancelled,

    #[error("export did not finish within {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ExportError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn fits(context: impl Into<String>, source: FitsWriteError) -> Self {
        Self::Fits {
            context: context.into(),
            source,
        }
    }

    pub fn image(context: impl Into<String>, source: image::ImageError) -> Self {
        Self::Image {
            context: context.into(),
            source,
        }
    }

    /// Issues when this is a validation failure.
    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            Self::Validation(issues) => Some(issues),
            _ => None,
        }
    }
}

// ============================================================================
// Unified
// ============================================================================

/// Error type returned by the service layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    PlateId(#[from] InvalidPlateId),

    #[error("{operation} did not finish within {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<LookupError> for Error {
    fn from(err: LookupError) -> Self {
        Self::Derive(DeriveError::Lookup(err))
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Self::Derive(DeriveError::Format(err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
