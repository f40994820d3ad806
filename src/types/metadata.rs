//! Header field values, ordered field maps and the export field schema.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Field values
// ============================================================================

/// A single header value as sent by the annotation UI.
///
/// Derived fields are always produced as `Text` in the fixed-width legacy
/// formats; operators may send plain JSON numbers for fields like EXPTIME.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    /// Empty or whitespace-only text counts as "not provided".
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }

    pub fn is_ascii(&self) -> bool {
        match self {
            Self::Text(s) => s.is_ascii(),
            Self::Integer(_) | Self::Real(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Integer(_) | Self::Real(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

// ============================================================================
// Ordered field maps
// ============================================================================

/// Insertion-ordered `FIELD -> value` map. Serialized as a JSON object with
/// keys in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(IndexMap<String, FieldValue>);

/// Per-object fields (OBJECT, SUFFIX, DATE-OBS, RA2000, ...).
pub type ObservationMetadata = FieldMap;

/// Plate-wide fields (OBSERVAT, PLATE-N, DIGITALI, SCANNER, ...).
pub type PlateMetadata = FieldMap;

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Trimmed text of a present, non-blank field.
    pub fn text(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .filter(|v| !v.is_blank())
            .map(|v| v.to_string().trim().to_string())
    }

    /// True when the field is present and not blank.
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_blank())
    }

    /// Insert or overwrite. An overwritten key keeps its original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a field, preserving the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a FieldMap {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = indexmap::map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Export schema
// ============================================================================

/// One header field of the export schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    /// FITS card comment.
    #[serde(default)]
    pub comment: String,
    /// Plate-wide field: the value comes from the plate metadata.
    #[serde(default)]
    pub global: bool,
    /// Written unquoted when the value parses as a number.
    #[serde(default)]
    pub numeric: bool,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(key: &str, comment: &str) -> Self {
        Self {
            key: key.to_string(),
            comment: comment.to_string(),
            global: false,
            numeric: false,
            required: false,
        }
    }

    #[must_use]
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    #[must_use]
    pub fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}
