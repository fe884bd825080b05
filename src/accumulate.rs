//! Turns a validated constraint index into per-reaction score adjustments.
//!
//! Three passes (metabolites, reactions, pathways) resolve the user's
//! identifiers against the universal network and fill `ConstraintsFromFile`.
//! None of the passes fail: an identifier the network does not carry is
//! normal for organism-specific input and contributes nothing. The one side
//! effect is directional: a metabolite constrained in a single direction
//! zeroes the bounds of the opposite split copy, because the user declared
//! the converse direction biologically excluded, not merely unscored.

use crate::constraints_file::{ConstraintIndex, ConstraintKind, Directionality};
use crate::pathways::PathwayMembershipIndex;
use crate::resolver;
use crate::universe::NetworkViews;
use indexmap::IndexMap;

/// The resolved constraint mapping handed to reaction scoring. Keys are
/// structural reaction IDs; for hard constraints only the score sign decides
/// inclusion or exclusion downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintsFromFile {
    pub soft: IndexMap<String, f64>,
    pub hard: IndexMap<String, f64>,
}

impl ConstraintsFromFile {
    pub fn is_empty(&self) -> bool {
        self.soft.is_empty() && self.hard.is_empty()
    }

    fn partition(&mut self, kind: ConstraintKind) -> &mut IndexMap<String, f64> {
        match kind {
            ConstraintKind::Soft => &mut self.soft,
            ConstraintKind::Hard => &mut self.hard,
        }
    }
}

const KINDS: [ConstraintKind; 2] = [ConstraintKind::Soft, ConstraintKind::Hard];

/// Resolve every constraint in `index` against the network. Mutates `views`
/// only through the opposite-split zeroing described in the module docs.
pub fn resolve_constraints(
    index: &ConstraintIndex,
    views: &mut NetworkViews,
    pathways: &PathwayMembershipIndex,
) -> ConstraintsFromFile {
    let mut constraints = ConstraintsFromFile::default();
    accumulate_metabolites(index, views, &mut constraints);
    accumulate_reactions(index, views, &mut constraints);
    accumulate_pathways(index, views, pathways, &mut constraints);
    reconcile_hard_splits(&mut constraints);
    constraints
}

/// Pass 1: metabolite constraints land on the exchange reactions that
/// produce or consume the metabolite, per the constrained direction.
fn accumulate_metabolites(
    index: &ConstraintIndex,
    views: &mut NetworkViews,
    constraints: &mut ConstraintsFromFile,
) {
    for kind in KINDS {
        for (bare_id, constraint) in index.metabolites(kind) {
            let Some(met_id) = resolver::resolve_metabolite(views, bare_id) else {
                continue;
            };

            let candidate_rxns = views.reactions_of_metabolite(&met_id).to_vec();
            for rxn_id in candidate_rxns {
                let Some(rxn) = views.reaction(&rxn_id) else {
                    continue;
                };
                if !rxn.is_exchange() {
                    continue;
                }
                let Some(&coefficient) = rxn.metabolites.get(&met_id) else {
                    continue;
                };
                let (lb, ub) = (rxn.lower_bound, rxn.upper_bound);

                let produces = (lb < 0.0 && coefficient > 0.0) || (ub > 0.0 && coefficient < 0.0);
                let consumes = (ub > 0.0 && coefficient > 0.0) || (lb < 0.0 && coefficient < 0.0);

                let wants_product = matches!(
                    constraint.direction,
                    Directionality::Product | Directionality::MediaAndProduct
                );
                let wants_media = matches!(
                    constraint.direction,
                    Directionality::Media | Directionality::MediaAndProduct
                );

                let matched = (wants_product && produces) || (wants_media && consumes);
                if !matched {
                    continue;
                }
                constraints
                    .partition(kind)
                    .insert(rxn_id.clone(), constraint.score);

                // A one-directional constraint excludes the converse
                // direction outright.
                if constraint.direction != Directionality::MediaAndProduct {
                    if let Some(partner) = NetworkViews::split_partner_id(&rxn_id) {
                        views.set_reaction_bounds(&partner, 0.0, 0.0);
                    }
                }
            }
        }
    }
}

/// Pass 2: reaction constraints apply directly to every resolved reaction,
/// overwriting earlier entries for the same ID.
fn accumulate_reactions(
    index: &ConstraintIndex,
    views: &NetworkViews,
    constraints: &mut ConstraintsFromFile,
) {
    for kind in KINDS {
        for (bare_id, &score) in index.reactions(kind) {
            for rxn_id in resolver::resolve_reactions(views, bare_id) {
                constraints.partition(kind).insert(rxn_id, score);
            }
        }
    }
}

/// Pass 3: pathway constraints expand through both membership tables.
/// Landing on an existing same-sign score corroborates it (+1); an
/// opposite-sign score is left alone; otherwise the pathway score applies.
fn accumulate_pathways(
    index: &ConstraintIndex,
    views: &NetworkViews,
    pathways: &PathwayMembershipIndex,
    constraints: &mut ConstraintsFromFile,
) {
    for kind in KINDS {
        for (pathway_id, &score) in index.pathways(kind) {
            let mut member_hits: Vec<String> = vec![];

            if let Some(module) = pathways.kegg_module(pathway_id) {
                for process in &module.reaction_sets {
                    for alternative_set in process {
                        for kegg_id in alternative_set {
                            collect_annotated(views, "kegg", kegg_id, &mut member_hits);
                        }
                    }
                }
            }
            if let Some(pathway) = pathways.biocyc_pathway(pathway_id) {
                for metacyc_id in &pathway.reactions {
                    collect_annotated(views, "metacyc", metacyc_id, &mut member_hits);
                }
            }

            let partition = constraints.partition(kind);
            for rxn_id in member_hits {
                match partition.get_mut(&rxn_id) {
                    Some(existing) if *existing * score > 0.0 => *existing += 1.0,
                    Some(_) => {}
                    None => {
                        partition.insert(rxn_id, score);
                    }
                }
            }
        }
    }
}

fn collect_annotated(views: &NetworkViews, namespace: &str, member_id: &str, out: &mut Vec<String>) {
    for rxn in views.reactions() {
        let Some(ids) = rxn.annotation.get(namespace) else {
            continue;
        };
        if ids.iter().any(|id| id == member_id) {
            out.push(rxn.id.clone());
        }
    }
}

/// A base reaction with both split directions hard-constrained is
/// irreconcilable; both copies are dropped rather than picking one.
fn reconcile_hard_splits(constraints: &mut ConstraintsFromFile) {
    let mut copies_per_base: IndexMap<String, usize> = IndexMap::new();
    for rxn_id in constraints.hard.keys() {
        let base = NetworkViews::strip_split_suffix(rxn_id);
        // Only split copies count toward a conflict; an unsplit reaction
        // that happens to share the base name is left alone.
        if base != *rxn_id {
            *copies_per_base.entry(base).or_insert(0) += 1;
        }
    }
    for (base, copies) in copies_per_base {
        if copies > 1 {
            constraints
                .hard
                .shift_remove(&format!("{base}_{}", crate::universe::FORWARD_TAG));
            constraints
                .hard
                .shift_remove(&format!("{base}_{}", crate::universe::REVERSE_TAG));
        }
    }
}
