//! Per-reaction evidence fusion.
//!
//! Three evidence channels meet here: homology (diamond hits, translated to
//! reactions through the bundled protein→reaction table), taxonomy-derived
//! constraints, and the resolved constraints file. Homology contributes the
//! best supporting hit's identity fraction per reaction; soft constraints
//! are added on top, taxonomy first and the user's file last. Hard
//! constraints ride alongside untouched — the pruner consumes only their
//! sign. An input with no usable evidence is a normal negative outcome,
//! reported as `None`.

use crate::accumulate::ConstraintsFromFile;
use crate::diamond::DiamondHit;
use crate::resolver;
use crate::taxonomy::TaxonomyConstraints;
use crate::universe::NetworkViews;
use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use itertools::Itertools;
use std::fs;
use std::path::Path;

/// Score a reference-model reaction is floored at when `--reference` names
/// a curated model containing it.
pub const REFERENCE_SCORE_FLOOR: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionScoring {
    /// Fused numeric score per structural reaction ID.
    pub scores: IndexMap<String, f64>,
    /// Hard constraints; only the sign matters downstream.
    pub hard: IndexMap<String, f64>,
    /// Input sequences supporting each reaction, for model annotation.
    pub genes_per_reaction: IndexMap<String, Vec<String>>,
}

/// Load the bundled protein→reaction table: two tab-separated columns,
/// reference protein ID and structural reaction ID, one pair per line.
pub fn load_protein_reaction_map(path: &Path) -> Result<IndexMap<String, Vec<String>>> {
    let text = fs::read_to_string(path).map_err(|e| {
        anyhow!(
            "Could not read protein-to-reaction table '{}': {e}",
            path.display()
        )
    })?;
    let mut map: IndexMap<String, Vec<String>> = IndexMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((protein, reaction)) = line.split_once('\t') else {
            return Err(anyhow!(
                "Protein-to-reaction table '{}' needs 2 tab-separated columns, got: {line}",
                path.display()
            ));
        };
        map.entry(protein.to_string())
            .or_default()
            .push(reaction.to_string());
    }
    Ok(map)
}

/// Fuse all evidence channels into per-reaction scores. Reactions the
/// universal network does not carry are dropped silently from every channel.
pub fn score_reactions(
    hits: &[DiamondHit],
    protein_map: &IndexMap<String, Vec<String>>,
    views: &NetworkViews,
    taxonomy: &TaxonomyConstraints,
    from_file: &ConstraintsFromFile,
) -> Option<ReactionScoring> {
    let mut scoring = ReactionScoring::default();

    // Homology channel: best supporting hit per reaction.
    for hit in hits {
        let Some(reactions) = protein_map.get(&hit.subject) else {
            continue;
        };
        for rxn_id in reactions {
            if !views.has_reaction(rxn_id) {
                continue;
            }
            let identity_score = hit.identity / 100.0;
            let entry = scoring.scores.entry(rxn_id.clone()).or_insert(f64::MIN);
            if identity_score > *entry {
                *entry = identity_score;
            }
            scoring
                .genes_per_reaction
                .entry(rxn_id.clone())
                .or_default()
                .push(hit.query.clone());
        }
    }
    for genes in scoring.genes_per_reaction.values_mut() {
        *genes = genes.iter().unique().cloned().collect();
    }

    // Soft constraint channels, taxonomy first so the user's file wins ties
    // by being applied last.
    for source in [&taxonomy.soft, &from_file.soft] {
        for (rxn_id, adjustment) in source {
            if !views.has_reaction(rxn_id) {
                continue;
            }
            *scoring.scores.entry(rxn_id.clone()).or_insert(0.0) += adjustment;
        }
    }

    // Hard constraints pass through; the file overrides taxonomy per ID.
    for source in [&taxonomy.hard, &from_file.hard] {
        for (rxn_id, &score) in source {
            if views.has_reaction(rxn_id) {
                scoring.hard.insert(rxn_id.clone(), score);
            }
        }
    }

    if scoring.scores.is_empty() && scoring.hard.is_empty() {
        return None;
    }
    Some(scoring)
}

/// Floor the score of every reaction the curated reference model shares with
/// the universal network. Returns how many reactions were adjusted.
pub fn apply_reference_model(
    reference_sbml: &Path,
    views: &NetworkViews,
    scoring: &mut ReactionScoring,
) -> Result<usize> {
    let reference = crate::universe_sbml::parse_sbml_file(reference_sbml)
        .map_err(|e| anyhow!("Failed to load reference model '{}': {e}", reference_sbml.display()))?;

    let mut adjusted = 0;
    for reference_rxn in &reference.reactions {
        for rxn_id in resolver::resolve_reactions(views, &reference_rxn.id) {
            let entry = scoring.scores.entry(rxn_id).or_insert(0.0);
            if *entry < REFERENCE_SCORE_FLOOR {
                *entry = REFERENCE_SCORE_FLOOR;
                adjusted += 1;
            }
        }
    }
    Ok(adjusted)
}
