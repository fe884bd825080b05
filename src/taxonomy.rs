//! Intake of taxonomy-derived constraints.
//!
//! Taxonomy evidence is produced by separate tooling and shipped as a JSON
//! sidecar next to the input genome (`<input>.taxonomy.json`). The mapping
//! has the same shape as the constraint engine's output plus auxiliary
//! metadata; it is accepted opaquely here and only ever merged by the
//! scoring step. A missing sidecar means no taxonomy evidence, which is the
//! common case and not an error.

use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SIDECAR_SUFFIX: &str = ".taxonomy.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyConstraints {
    #[serde(default)]
    pub soft: IndexMap<String, f64>,
    #[serde(default)]
    pub hard: IndexMap<String, f64>,
    /// Taxon the constraints were derived for, when the producer recorded it.
    #[serde(default)]
    pub taxon: Option<String>,
    /// Reactions the taxonomic neighborhood is known to carry. Scoring uses
    /// this as corroborating context, not as a constraint by itself.
    #[serde(default)]
    pub reactions_in_taxonomy: Vec<String>,
}

impl TaxonomyConstraints {
    pub fn is_empty(&self) -> bool {
        self.soft.is_empty() && self.hard.is_empty() && self.reactions_in_taxonomy.is_empty()
    }
}

pub fn sidecar_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Load the sidecar for `input`. Absent file yields the empty default; a
/// present but malformed sidecar is an error, since silently ignoring it
/// would drop evidence the user prepared on purpose.
pub fn load_for_input(input: &Path) -> Result<TaxonomyConstraints> {
    let path = sidecar_path(input);
    if !path.exists() {
        return Ok(TaxonomyConstraints::default());
    }
    let text = fs::read_to_string(&path)
        .map_err(|e| anyhow!("Could not read taxonomy sidecar '{}': {e}", path.display()))?;
    serde_json::from_str(&text)
        .map_err(|e| anyhow!("Could not parse taxonomy sidecar '{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sidecar_path_appends_full_suffix() {
        assert_eq!(
            sidecar_path(Path::new("genomes/eco.faa")),
            PathBuf::from("genomes/eco.faa.taxonomy.json")
        );
    }

    #[test]
    fn test_missing_sidecar_yields_empty_default() {
        let td = tempdir().unwrap();
        let input = td.path().join("eco.faa");
        let constraints = load_for_input(&input).unwrap();
        assert!(constraints.is_empty());
        assert!(constraints.taxon.is_none());
    }

    #[test]
    fn test_sidecar_is_loaded_when_present() {
        let td = tempdir().unwrap();
        let input = td.path().join("eco.faa");
        fs::write(
            sidecar_path(&input),
            r#"{"soft": {"10000_forwardTemp": 0.5}, "taxon": "Escherichia coli",
                "reactions_in_taxonomy": ["10000_forwardTemp"]}"#,
        )
        .unwrap();

        let constraints = load_for_input(&input).unwrap();
        assert_eq!(constraints.soft.get("10000_forwardTemp"), Some(&0.5));
        assert!(constraints.hard.is_empty());
        assert_eq!(constraints.taxon.as_deref(), Some("Escherichia coli"));
    }

    #[test]
    fn test_malformed_sidecar_is_an_error() {
        let td = tempdir().unwrap();
        let input = td.path().join("eco.faa");
        fs::write(sidecar_path(&input), "not json").unwrap();
        let err = load_for_input(&input).unwrap_err();
        assert!(err.to_string().contains("taxonomy sidecar"));
    }
}
