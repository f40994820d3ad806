//! Pre-export validation gates.
//!
//! All gates run and every issue is collected; the pipeline writes nothing
//! unless the list comes back empty.

use std::collections::HashMap;

use crate::error::{ValidationIssue, ValidationRule};
use crate::types::{Annotation, FieldSpec, ObservationMetadata, PlateMetadata};

/// Characters that cannot appear in an artifact filename component.
pub const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Field names that carry an object's identity on disk.
#[derive(Debug, Clone, Copy)]
pub struct IdentityFields<'a> {
    pub identifier: &'a str,
    pub suffix: &'a str,
}

impl IdentityFields<'_> {
    /// (identifier, suffix), trimmed; a missing suffix is empty.
    pub fn key_of(&self, metadata: &ObservationMetadata) -> (String, String) {
        (
            metadata.text(self.identifier).unwrap_or_default(),
            metadata.text(self.suffix).unwrap_or_default(),
        )
    }
}

/// FITS keyword syntax: 1-8 characters of `A-Z`, `0-9`, `-`, `_`.
pub fn is_valid_keyword(key: &str) -> bool {
    (1..=8).contains(&key.len())
        && key
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

/// `<identifier>` or `<identifier>_<suffix>`.
pub fn object_label(identifier: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        identifier.to_string()
    } else {
        format!("{identifier}_{suffix}")
    }
}

/// Run every gate over a batch.
pub fn validate_batch(
    annotations: &[Annotation],
    plate: &PlateMetadata,
    schema: &[FieldSpec],
    identity: IdentityFields<'_>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if annotations.is_empty() {
        issues.push(ValidationIssue::new(ValidationRule::EmptyBatch, "batch"));
    }

    for spec in schema {
        if !is_valid_keyword(&spec.key) {
            issues.push(ValidationIssue::new(
                ValidationRule::InvalidKeyword,
                format!("keyword '{}'", spec.key.escape_default()),
            ));
        }
    }

    for (key, value) in plate {
        if !value.is_ascii() {
            issues.push(ValidationIssue::new(ValidationRule::NonAscii, format!("plate field {key}")));
        }
    }

    let mut seen: HashMap<(String, String), usize> = HashMap::new();

    for (idx, annotation) in annotations.iter().enumerate() {
        let n = idx + 1;
        let meta = &annotation.metadata;

        for (key, value) in meta {
            if !value.is_ascii() {
                issues.push(ValidationIssue::new(
                    ValidationRule::NonAscii,
                    format!("object #{n} field {key}"),
                ));
            }
        }

        let (identifier, suffix) = identity.key_of(meta);
        if identifier.is_empty() {
            issues.push(ValidationIssue::new(
                ValidationRule::MissingIdentifier,
                format!("object #{n} has no {}", identity.identifier),
            ));
            continue;
        }

        for (field, value) in [(identity.identifier, &identifier), (identity.suffix, &suffix)] {
            if value.contains(ILLEGAL_FILENAME_CHARS) {
                issues.push(ValidationIssue::new(
                    ValidationRule::IllegalCharacter,
                    format!("object #{n} {field} '{value}'"),
                ));
            }
        }

        if let Some(first) = seen.insert((identifier.clone(), suffix.clone()), n) {
            issues.push(ValidationIssue::new(
                ValidationRule::DuplicateIdentifier,
                format!("{} (objects #{first} and #{n})", object_label(&identifier, &suffix)),
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    const IDENTITY: IdentityFields<'static> = IdentityFields {
        identifier: "OBJECT",
        suffix: "SUFFIX",
    };

    fn object(fields: &[(&str, &str)]) -> Annotation {
        Annotation {
            bbox: BoundingBox::new(0.0, 0.0, 5.0, 5.0),
            metadata: fields.iter().copied().collect(),
        }
    }

    fn rules(issues: &[ValidationIssue]) -> Vec<ValidationRule> {
        issues.iter().map(|i| i.rule).collect()
    }

    #[test]
    fn test_clean_batch_passes() {
        let batch = [
            object(&[("OBJECT", "Sirius"), ("SUFFIX", "a")]),
            object(&[("OBJECT", "Sirius"), ("SUFFIX", "b")]),
            object(&[("OBJECT", "Vega")]),
        ];
        let schema = [FieldSpec::new("OBJECT", ""), FieldSpec::new("DATE-OBS", "")];
        assert!(validate_batch(&batch, &PlateMetadata::new(), &schema, IDENTITY).is_empty());
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let issues = validate_batch(&[], &PlateMetadata::new(), &[], IDENTITY);
        assert_eq!(rules(&issues), [ValidationRule::EmptyBatch]);
    }

    #[test]
    fn test_duplicate_pairs_are_rejected() {
        let batch = [
            object(&[("OBJECT", "Sirius"), ("SUFFIX", "a")]),
            object(&[("OBJECT", " Sirius "), ("SUFFIX", "a")]),
        ];
        let issues = validate_batch(&batch, &PlateMetadata::new(), &[], IDENTITY);
        assert_eq!(rules(&issues), [ValidationRule::DuplicateIdentifier]);
        assert!(issues[0].subject.starts_with("Sirius_a"), "{}", issues[0].subject);
    }

    #[test]
    fn test_every_non_ascii_field_is_named() {
        let plate: PlateMetadata = [("OBSERVAT", "Córdoba"), ("PLATE-N", "B-12")].into_iter().collect();
        let batch = [object(&[("OBJECT", "Sirius"), ("OBSERVER", "Ñañez")])];
        let issues = validate_batch(&batch, &plate, &[], IDENTITY);
        let subjects: Vec<_> = issues.iter().map(|i| i.subject.as_str()).collect();
        assert_eq!(subjects, ["plate field OBSERVAT", "object #1 field OBSERVER"]);
    }

    #[test]
    fn test_missing_identifier_and_illegal_characters() {
        let batch = [
            object(&[("OBJECT", "  ")]),
            object(&[("OBJECT", "HD 1/2"), ("SUFFIX", "x?")]),
        ];
        let issues = validate_batch(&batch, &PlateMetadata::new(), &[], IDENTITY);
        assert_eq!(
            rules(&issues),
            [
                ValidationRule::MissingIdentifier,
                ValidationRule::IllegalCharacter,
                ValidationRule::IllegalCharacter
            ]
        );
    }

    #[test]
    fn test_keyword_syntax() {
        assert!(is_valid_keyword("DATE-OBS"));
        assert!(is_valid_keyword("SCAN_RES"));
        assert!(!is_valid_keyword(""));
        assert!(!is_valid_keyword("date-obs"));
        assert!(!is_valid_keyword("TOOLONGKEY"));
        let issues = validate_batch(
            &[object(&[("OBJECT", "Vega")])],
            &PlateMetadata::new(),
            &[FieldSpec::new("bad key", "")],
            IDENTITY,
        );
        assert_eq!(rules(&issues), [ValidationRule::InvalidKeyword]);
    }
}
