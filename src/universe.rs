//! The universal reaction network and its two identifier views.
//!
//! The structural view carries stoichiometry, bounds and cross-database
//! annotations under plain identifiers (no `R_`/`M_` prefix). The solver view
//! mirrors every reaction's bounds under the solver encoding: an `R_` prefix
//! plus `-`, `.` and `+` escaped as `__45__`, `__46__` and `__43__`. Both
//! views live in one repository so a bounds update can never leave them
//! disagreeing.
//!
//! Reversible universal reactions are shipped pre-split into one-directional
//! copies whose identifiers end in `_forwardTemp` / `_reverseTemp`.

use crate::datafiles;
use crate::universe_sbml;
use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const FORWARD_TAG: &str = "forwardTemp";
pub const REVERSE_TAG: &str = "reverseTemp";

/// Default flux bound magnitude used when re-merging split reactions.
pub const DEFAULT_BOUND: f64 = 1000.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniversalMetabolite {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub compartment: Option<String>,
    /// Cross-database identifiers keyed by namespace (`bigg`, `chebi`,
    /// `kegg`, `seed`, ...). Values are always lists, even for single IDs.
    #[serde(default)]
    pub annotation: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniversalReaction {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Metabolite id -> stoichiometric coefficient; negative consumes,
    /// positive produces.
    #[serde(default)]
    pub metabolites: IndexMap<String, f64>,
    pub lower_bound: f64,
    pub upper_bound: f64,
    #[serde(default)]
    pub annotation: IndexMap<String, Vec<String>>,
}

impl UniversalReaction {
    /// Exchange reactions touch exactly one metabolite.
    pub fn is_exchange(&self) -> bool {
        self.metabolites.len() == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverBounds {
    pub lb: f64,
    pub ub: f64,
}

/// Serialized form of the network, cached as JSON next to the SBML source so
/// later runs skip the XML parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub metabolites: Vec<UniversalMetabolite>,
    pub reactions: Vec<UniversalReaction>,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkViews {
    metabolites: IndexMap<String, UniversalMetabolite>,
    reactions: IndexMap<String, UniversalReaction>,
    metabolite_reactions: IndexMap<String, Vec<String>>,
    solver_bounds: IndexMap<String, SolverBounds>,
}

impl NetworkViews {
    pub fn from_parts(
        metabolites: Vec<UniversalMetabolite>,
        reactions: Vec<UniversalReaction>,
    ) -> Self {
        let mut views = Self {
            metabolites: metabolites.into_iter().map(|m| (m.id.clone(), m)).collect(),
            reactions: reactions.into_iter().map(|r| (r.id.clone(), r)).collect(),
            metabolite_reactions: IndexMap::new(),
            solver_bounds: IndexMap::new(),
        };
        views.rebuild_derived();
        views
    }

    pub fn from_snapshot(snapshot: NetworkSnapshot) -> Self {
        Self::from_parts(snapshot.metabolites, snapshot.reactions)
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            metabolites: self.metabolites.values().cloned().collect(),
            reactions: self.reactions.values().cloned().collect(),
        }
    }

    fn rebuild_derived(&mut self) {
        self.metabolite_reactions.clear();
        self.solver_bounds.clear();
        for rxn in self.reactions.values() {
            self.solver_bounds.insert(
                Self::solver_reaction_id(&rxn.id),
                SolverBounds {
                    lb: rxn.lower_bound,
                    ub: rxn.upper_bound,
                },
            );
            for met_id in rxn.metabolites.keys() {
                self.metabolite_reactions
                    .entry(met_id.clone())
                    .or_default()
                    .push(rxn.id.clone());
            }
        }
    }

    /// Prefer the JSON snapshot; fall back to parsing the universal SBML and
    /// cache the result. A stale or unreadable snapshot is rebuilt, never
    /// repaired in place.
    pub fn load_or_build(generated_dir: &Path) -> Result<Self> {
        let snapshot_path = generated_dir.join(datafiles::NETWORK_SNAPSHOT_FILE);
        if let Ok(text) = fs::read_to_string(&snapshot_path) {
            if let Ok(snapshot) = serde_json::from_str::<NetworkSnapshot>(&text) {
                return Ok(Self::from_snapshot(snapshot));
            }
        }

        let sbml_path = generated_dir.join(datafiles::UNIVERSAL_SBML_FILE);
        let snapshot = universe_sbml::parse_sbml_file(&sbml_path)
            .map_err(|e| anyhow!("Failed to load universe model '{}': {e}", sbml_path.display()))?;
        let views = Self::from_snapshot(snapshot);

        let text = serde_json::to_string(&views.snapshot())
            .map_err(|e| anyhow!("Could not serialize network snapshot: {e}"))?;
        fs::write(&snapshot_path, text).map_err(|e| {
            anyhow!(
                "Could not write network snapshot '{}': {e}",
                snapshot_path.display()
            )
        })?;
        Ok(views)
    }

    pub fn metabolite(&self, id: &str) -> Option<&UniversalMetabolite> {
        self.metabolites.get(id)
    }

    pub fn reaction(&self, id: &str) -> Option<&UniversalReaction> {
        self.reactions.get(id)
    }

    pub fn has_reaction(&self, id: &str) -> bool {
        self.reactions.contains_key(id)
    }

    pub fn metabolites(&self) -> impl Iterator<Item = &UniversalMetabolite> {
        self.metabolites.values()
    }

    pub fn reactions(&self) -> impl Iterator<Item = &UniversalReaction> {
        self.reactions.values()
    }

    pub fn metabolite_count(&self) -> usize {
        self.metabolites.len()
    }

    pub fn reaction_count(&self) -> usize {
        self.reactions.len()
    }

    /// Reactions the metabolite participates in, in network order.
    pub fn reactions_of_metabolite(&self, metabolite_id: &str) -> &[String] {
        self.metabolite_reactions
            .get(metabolite_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn solver_bounds_of(&self, solver_id: &str) -> Option<SolverBounds> {
        self.solver_bounds.get(solver_id).copied()
    }

    /// Update one reaction's bounds in both views atomically. Returns false
    /// when the reaction is unknown, in which case nothing changes.
    pub fn set_reaction_bounds(&mut self, reaction_id: &str, lower: f64, upper: f64) -> bool {
        let Some(rxn) = self.reactions.get_mut(reaction_id) else {
            return false;
        };
        rxn.lower_bound = lower;
        rxn.upper_bound = upper;
        let solver_id = Self::solver_reaction_id(reaction_id);
        if let Some(bounds) = self.solver_bounds.get_mut(&solver_id) {
            bounds.lb = lower;
            bounds.ub = upper;
        }
        true
    }

    /// Structural id -> solver id transcoding. The one place the encoding
    /// lives; both views are kept consistent through it.
    pub fn solver_reaction_id(structural_id: &str) -> String {
        let escaped = structural_id
            .replace('-', "__45__")
            .replace('.', "__46__")
            .replace('+', "__43__");
        format!("R_{escaped}")
    }

    /// The opposite-direction copy of a split reaction, if `id` is one.
    pub fn split_partner_id(id: &str) -> Option<String> {
        if id.contains(FORWARD_TAG) {
            Some(id.replace(FORWARD_TAG, REVERSE_TAG))
        } else if id.contains(REVERSE_TAG) {
            Some(id.replace(REVERSE_TAG, FORWARD_TAG))
        } else {
            None
        }
    }

    /// Identifier with any `_forwardTemp` / `_reverseTemp` suffix removed.
    pub fn strip_split_suffix(id: &str) -> String {
        id.replace("_reverseTemp", "").replace("_forwardTemp", "")
    }
}
