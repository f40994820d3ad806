//! Plate identity, bounding boxes and annotation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::{ObservationMetadata, PlateMetadata};

// ============================================================================
// Plate identity
// ============================================================================

/// Normalized plate filename (the final path component of the plate image),
/// used as the key for locks, cache records and export directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlateId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid plate id '{0}'")]
pub struct InvalidPlateId(pub String);

impl PlateId {
    /// Normalize an image path or filename into a plate id.
    pub fn parse(value: &str) -> Result<Self, InvalidPlateId> {
        let invalid = || InvalidPlateId(value.to_string());
        let name = value
            .trim()
            .rsplit(['/', '\\'])
            .next()
            .map(str::trim)
            .ok_or_else(invalid)?;

        if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
            return Err(invalid());
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filename without its extension (`plate_0042.tif` -> `plate_0042`).
    pub fn stem(&self) -> &str {
        match self.0.rfind('.') {
            Some(idx) if idx > 0 => &self.0[..idx],
            _ => &self.0,
        }
    }
}

impl std::fmt::Display for PlateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlateId {
    type Error = InvalidPlateId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlateId> for String {
    fn from(id: PlateId) -> Self {
        id.0
    }
}

// ============================================================================
// Boxes and annotations
// ============================================================================

/// Axis-aligned box in canonical (landscape) image pixels, as sent by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// One marked spectrum: its box and its per-object fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(default)]
    pub metadata: ObservationMetadata,
}

/// Everything the operator has attached to one plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateRecord {
    pub plate: PlateId,
    #[serde(default)]
    pub plate_metadata: PlateMetadata,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    pub updated_at: DateTime<Utc>,
}

impl PlateRecord {
    pub fn new(plate: PlateId, plate_metadata: PlateMetadata, annotations: Vec<Annotation>) -> Self {
        Self {
            plate,
            plate_metadata,
            annotations,
            updated_at: Utc::now(),
        }
    }
}

// ============================================================================
// Cache state
// ============================================================================

/// Lifecycle state of a plate's annotation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationState {
    None,
    Working,
    Saved,
}

impl std::fmt::Display for AnnotationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Working => write!(f, "working"),
            Self::Saved => write!(f, "saved"),
        }
    }
}

/// Result of a cache load: the state plus the record when one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub state: AnnotationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<PlateRecord>,
}

impl CacheEntry {
    pub const fn none() -> Self {
        Self {
            state: AnnotationState::None,
            record: None,
        }
    }
}

/// One row of a plate directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateListing {
    pub plate: PlateId,
    pub state: AnnotationState,
    /// Exact for working records; not reported for saved ones.
    pub objects: Option<usize>,
}
