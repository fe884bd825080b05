//! Identifier resolution against the universal network.
//!
//! Constraint files carry identifiers from whatever database the user had at
//! hand, so resolution tries the bare identifier first and falls back to the
//! cross-database annotations in a fixed namespace order. Metabolite lookup
//! yields at most one match (first wins, a deliberate precision/recall
//! tradeoff); reaction lookup may yield several, typically both copies of a
//! split reversible reaction.

use crate::universe::NetworkViews;

/// Namespace scan order for metabolite annotations.
pub const METABOLITE_NAMESPACES: [&str; 4] = ["bigg", "chebi", "kegg", "seed"];

/// Namespace scan order for reaction annotations. The empty namespace holds
/// annotation tokens that carried no provider code.
pub const REACTION_NAMESPACES: [&str; 5] = ["rhea", "bigg", "kegg", "seed", ""];

/// Resolve a bare metabolite identifier to a structural metabolite ID.
///
/// Direct lookup first; on miss, metabolites are scanned in network order and
/// each namespace is tried for the bare ID or the bare ID with an `_e`
/// (extracellular) suffix. The first matching metabolite wins.
pub fn resolve_metabolite(views: &NetworkViews, bare_id: &str) -> Option<String> {
    if views.metabolite(bare_id).is_some() {
        return Some(bare_id.to_string());
    }

    let external_variant = format!("{bare_id}_e");
    for met in views.metabolites() {
        for namespace in METABOLITE_NAMESPACES {
            let Some(ids) = met.annotation.get(namespace) else {
                continue;
            };
            if ids.iter().any(|id| id == bare_id || *id == external_variant) {
                return Some(met.id.clone());
            }
        }
    }
    None
}

/// Resolve a bare reaction identifier to structural reaction IDs.
///
/// Direct lookup first, then the forward/reverse split variants, then an
/// annotation scan that stops at the first namespace yielding any match —
/// within that namespace every matching reaction is collected.
pub fn resolve_reactions(views: &NetworkViews, bare_id: &str) -> Vec<String> {
    if views.has_reaction(bare_id) {
        return vec![bare_id.to_string()];
    }

    let mut found = vec![];
    for tag in [crate::universe::FORWARD_TAG, crate::universe::REVERSE_TAG] {
        let variant = format!("{bare_id}_{tag}");
        if views.has_reaction(&variant) {
            found.push(variant);
        }
    }
    if !found.is_empty() {
        return found;
    }

    let stripped = NetworkViews::strip_split_suffix(bare_id);
    for namespace in REACTION_NAMESPACES {
        for rxn in views.reactions() {
            let Some(ids) = rxn.annotation.get(namespace) else {
                continue;
            };
            if ids.iter().any(|id| id == bare_id || *id == stripped) {
                found.push(rxn.id.clone());
            }
        }
        if !found.is_empty() {
            break;
        }
    }
    found
}
