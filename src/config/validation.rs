//! Unknown-key detection with "did you mean?" suggestions.
//!
//! The raw TOML is walked before serde sees it. Keys that `DigitizerConfig`
//! does not know are reported as warnings only; serde then ignores them.

use std::collections::HashSet;

/// A non-fatal config warning.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

/// Every dotted table/key path `DigitizerConfig` accepts. Array-of-table
/// sections (`[[sites]]`, `[[schema]]`, `[[catalog.entries]]`) are checked
/// at their top level only.
pub fn known_config_keys() -> HashSet<&'static str> {
    [
        // [workspace]
        "workspace",
        "workspace.cache_dir",
        "workspace.output_dir",
        "workspace.settings_file",
        "workspace.plate_extensions",
        // [catalog]
        "catalog",
        "catalog.backend",
        "catalog.endpoint",
        "catalog.entries",
        // [limits]
        "limits",
        "limits.blocking_workers",
        "limits.concurrent_lookups",
        "limits.lookup_timeout_secs",
        "limits.export_timeout_secs",
        "limits.cache_timeout_secs",
        // [export]
        "export",
        "export.identifier_field",
        "export.suffix_field",
        "export.provenance_footer",
        "export.invert",
        // arrays
        "sites",
        "schema",
    ]
    .into_iter()
    .collect()
}

/// Dotted paths of every table and key in `value`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Closest known key within three edits, ties broken alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

/// Warnings for every key in `raw_toml` that the config does not define.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        // Parse errors are reported by serde.
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("export", "export"), 0);
        assert_eq!(levenshtein("exprot", "export"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [limits]
            blocking_workers = 2
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert_eq!(keys, ["limits", "limits.blocking_workers"]);
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
[export]
identifer_field = "NAME"
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "export.identifer_field");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("export.identifier_field"));
        assert!(warnings[0].to_string().contains("did you mean"));
    }

    #[test]
    fn test_array_sections_are_accepted() {
        let warnings = validate_unknown_keys(
            r#"
[[sites]]
code = "x"
latitude = 0.0
longitude = 0.0
utc_offset_hours = 0.0

[[schema]]
key = "OBJECT"
"#,
        );
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_unparsable_toml_yields_no_warnings() {
        assert!(validate_unknown_keys("[[[").is_empty());
    }
}
