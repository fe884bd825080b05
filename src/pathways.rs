//! KEGG module and BioCyc pathway membership tables.
//!
//! Both tables are shipped as generated JSON snapshots in the data directory
//! and are only ever read, never edited, by a reconstruction run. Lookup is
//! case-insensitive; the canonical (as-shipped) identifier casing is kept for
//! expansion so annotation matching stays exact.

use crate::datafiles;
use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One KEGG module. `reaction_sets` keeps the module's nested shape:
/// outer list per process step, middle list per alternative reaction set,
/// inner list of KEGG reaction identifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct KeggModule {
    #[serde(rename = "ModuleName", default)]
    pub name: Option<String>,
    #[serde(rename = "RxnsInvolved", default)]
    pub reaction_sets: Vec<Vec<Vec<String>>>,
}

/// One BioCyc pathway: a flat list of MetaCyc reaction identifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct BiocycPathway {
    #[serde(rename = "PathwayName", default)]
    pub name: Option<String>,
    #[serde(rename = "RxnsInvolved", default)]
    pub reactions: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PathwayMembershipIndex {
    kegg_modules: IndexMap<String, KeggModule>,
    biocyc_pathways: IndexMap<String, BiocycPathway>,
    kegg_by_lower: HashMap<String, String>,
    biocyc_by_lower: HashMap<String, String>,
}

impl PathwayMembershipIndex {
    pub fn from_json_texts(kegg_json: &str, biocyc_json: &str) -> Result<Self> {
        let kegg_modules: IndexMap<String, KeggModule> = serde_json::from_str(kegg_json)
            .map_err(|e| anyhow!("Could not parse KEGG module table: {e}"))?;
        let biocyc_pathways: IndexMap<String, BiocycPathway> = serde_json::from_str(biocyc_json)
            .map_err(|e| anyhow!("Could not parse BioCyc pathway table: {e}"))?;

        let mut kegg_by_lower = HashMap::new();
        for id in kegg_modules.keys() {
            kegg_by_lower
                .entry(id.to_lowercase())
                .or_insert_with(|| id.clone());
        }
        let mut biocyc_by_lower = HashMap::new();
        for id in biocyc_pathways.keys() {
            biocyc_by_lower
                .entry(id.to_lowercase())
                .or_insert_with(|| id.clone());
        }

        Ok(Self {
            kegg_modules,
            biocyc_pathways,
            kegg_by_lower,
            biocyc_by_lower,
        })
    }

    pub fn load_from_dir(generated_dir: &Path) -> Result<Self> {
        let kegg_path = generated_dir.join(datafiles::KEGG_MODULES_FILE);
        let kegg_json = fs::read_to_string(&kegg_path)
            .map_err(|e| anyhow!("Could not read KEGG module table '{}': {e}", kegg_path.display()))?;
        let biocyc_path = generated_dir.join(datafiles::BIOCYC_PATHWAYS_FILE);
        let biocyc_json = fs::read_to_string(&biocyc_path).map_err(|e| {
            anyhow!(
                "Could not read BioCyc pathway table '{}': {e}",
                biocyc_path.display()
            )
        })?;
        Self::from_json_texts(&kegg_json, &biocyc_json)
    }

    /// Case-insensitive existence check across both tables. Used by the
    /// constraints parser to reject unknown pathway identifiers up front.
    pub fn contains(&self, pathway_id: &str) -> bool {
        let lower = pathway_id.to_lowercase();
        self.kegg_by_lower.contains_key(&lower) || self.biocyc_by_lower.contains_key(&lower)
    }

    pub fn kegg_module(&self, pathway_id: &str) -> Option<&KeggModule> {
        let canonical = self.kegg_by_lower.get(&pathway_id.to_lowercase())?;
        self.kegg_modules.get(canonical)
    }

    pub fn biocyc_pathway(&self, pathway_id: &str) -> Option<&BiocycPathway> {
        let canonical = self.biocyc_by_lower.get(&pathway_id.to_lowercase())?;
        self.biocyc_pathways.get(canonical)
    }

    pub fn kegg_module_count(&self) -> usize {
        self.kegg_modules.len()
    }

    pub fn biocyc_pathway_count(&self) -> usize {
        self.biocyc_pathways.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEGG_JSON: &str = r#"{
  "M00001": {
    "ModuleName": "Glycolysis (Embden-Meyerhof pathway)",
    "RxnsInvolved": [[["R01786", "R09085"]], [["R02189"], ["R09084"]]]
  },
  "M00002": {
    "RxnsInvolved": [[["R00200"]]]
  }
}"#;

    const BIOCYC_JSON: &str = r#"{
  "PWY-5484": {
    "PathwayName": "glycolysis II",
    "RxnsInvolved": ["GLUCOKIN-RXN", "PEPDEPHOS-RXN"]
  }
}"#;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let index = PathwayMembershipIndex::from_json_texts(KEGG_JSON, BIOCYC_JSON).unwrap();
        assert!(index.contains("m00001"));
        assert!(index.contains("M00001"));
        assert!(index.contains("pwy-5484"));
        assert!(!index.contains("PWY-0000"));

        let module = index.kegg_module("m00001").unwrap();
        assert_eq!(
            module.name.as_deref(),
            Some("Glycolysis (Embden-Meyerhof pathway)")
        );
        let pathway = index.biocyc_pathway("Pwy-5484").unwrap();
        assert_eq!(pathway.reactions, vec!["GLUCOKIN-RXN", "PEPDEPHOS-RXN"]);
    }

    #[test]
    fn test_kegg_module_keeps_nested_reaction_sets() {
        let index = PathwayMembershipIndex::from_json_texts(KEGG_JSON, BIOCYC_JSON).unwrap();
        let module = index.kegg_module("M00001").unwrap();
        assert_eq!(module.reaction_sets.len(), 2);
        assert_eq!(module.reaction_sets[0][0], vec!["R01786", "R09085"]);
        assert_eq!(module.reaction_sets[1].len(), 2);
    }

    #[test]
    fn test_missing_optional_name_is_tolerated() {
        let index = PathwayMembershipIndex::from_json_texts(KEGG_JSON, BIOCYC_JSON).unwrap();
        let module = index.kegg_module("M00002").unwrap();
        assert!(module.name.is_none());
        assert_eq!(module.reaction_sets[0][0], vec!["R00200"]);
    }

    #[test]
    fn test_malformed_table_is_rejected() {
        let err = PathwayMembershipIndex::from_json_texts("[1,2]", BIOCYC_JSON).unwrap_err();
        assert!(err.to_string().contains("KEGG module table"));
    }
}
