//! Materializes the draft model from the scored universal network.
//!
//! Pruning here is a pure evidence threshold, no flux optimization: keep
//! every reaction with a positive fused score, force-include positive hard
//! constraints, force-exclude negative ones. Surviving forward/reverse split
//! copies are re-joined under their base identifier, with the forward copy
//! contributing the upper bound and the reverse copy a negated lower bound.
//! Metabolites no kept reaction touches are dropped.

use crate::scoring::ReactionScoring;
use crate::universe::{NetworkViews, UniversalMetabolite, UniversalReaction};
use anyhow::{Result, anyhow};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct DraftModel {
    pub id: String,
    pub metabolites: Vec<UniversalMetabolite>,
    pub reactions: Vec<UniversalReaction>,
}

/// Select and re-merge the evidence-supported reactions. `None` when nothing
/// survives, which callers report as a negative outcome rather than a crash.
pub fn prune_model(
    views: &NetworkViews,
    scoring: &ReactionScoring,
    model_id: &str,
) -> Option<DraftModel> {
    let mut kept: IndexSet<String> = scoring
        .scores
        .iter()
        .filter(|(id, score)| **score > 0.0 && views.has_reaction(id))
        .map(|(id, _)| id.clone())
        .collect();
    for (id, &score) in &scoring.hard {
        if score > 0.0 && views.has_reaction(id) {
            kept.insert(id.clone());
        } else if score < 0.0 {
            kept.shift_remove(id);
        }
    }
    if kept.is_empty() {
        return None;
    }

    // Group by base identifier so split pairs come back as one reversible
    // reaction. unique() keeps the first occurrence's order stable.
    let bases: Vec<String> = kept
        .iter()
        .map(|id| NetworkViews::strip_split_suffix(id))
        .unique()
        .collect();

    let mut reactions = vec![];
    for base in &bases {
        let forward_id = format!("{base}_{}", crate::universe::FORWARD_TAG);
        let reverse_id = format!("{base}_{}", crate::universe::REVERSE_TAG);
        let forward = kept
            .contains(&forward_id)
            .then(|| views.reaction(&forward_id))
            .flatten();
        let reverse = kept
            .contains(&reverse_id)
            .then(|| views.reaction(&reverse_id))
            .flatten();

        let merged = match (forward, reverse) {
            (Some(forward), reverse) => {
                let mut rxn = forward.clone();
                rxn.id = base.clone();
                rxn.lower_bound = reverse.map(|r| -r.upper_bound).unwrap_or(0.0);
                rxn
            }
            (None, Some(reverse)) => {
                // Only the reverse direction survived: flip its
                // stoichiometry so the base reaction reads forward.
                let mut rxn = reverse.clone();
                rxn.id = base.clone();
                rxn.metabolites = rxn
                    .metabolites
                    .iter()
                    .map(|(met, coeff)| (met.clone(), -coeff))
                    .collect();
                rxn.lower_bound = -reverse.upper_bound;
                rxn.upper_bound = 0.0;
                rxn
            }
            (None, None) => match views.reaction(base) {
                Some(rxn) => rxn.clone(),
                None => continue,
            },
        };
        reactions.push(merged);
    }
    if reactions.is_empty() {
        return None;
    }

    let used_metabolites: IndexSet<&String> =
        reactions.iter().flat_map(|rxn| rxn.metabolites.keys()).collect();
    let metabolites = views
        .metabolites()
        .filter(|met| used_metabolites.contains(&met.id))
        .cloned()
        .collect();

    Some(DraftModel {
        id: model_id.to_string(),
        metabolites,
        reactions,
    })
}

pub fn write_sbml(model: &DraftModel, path: &Path) -> Result<()> {
    let text = render_sbml(model)?;
    fs::write(path, text)
        .map_err(|e| anyhow!("Could not write model file '{}': {e}", path.display()))
}

fn render_sbml(model: &DraftModel) -> Result<String> {
    // Shared flux-bound parameters, one per distinct value.
    let mut parameters: IndexMap<String, f64> = IndexMap::new();
    let mut parameter_id = |value: f64| {
        let id = format!("bound_{}", value.to_string().replace(['-', '.'], "_"));
        parameters.entry(id.clone()).or_insert(value);
        id
    };

    let reactions = model
        .reactions
        .iter()
        .map(|rxn| {
            let mut reactants = vec![];
            let mut products = vec![];
            for (met_id, &coefficient) in &rxn.metabolites {
                let reference = SpeciesRefOut {
                    species: sbml_id("M_", met_id),
                    stoichiometry: coefficient.abs(),
                };
                if coefficient < 0.0 {
                    reactants.push(reference);
                } else {
                    products.push(reference);
                }
            }
            ReactionOut {
                id: sbml_id("R_", &rxn.id),
                name: rxn.name.clone(),
                reversible: rxn.lower_bound < 0.0,
                lower_flux_bound: parameter_id(rxn.lower_bound),
                upper_flux_bound: parameter_id(rxn.upper_bound),
                reactants: (!reactants.is_empty())
                    .then_some(SpeciesRefListOut { references: reactants }),
                products: (!products.is_empty())
                    .then_some(SpeciesRefListOut { references: products }),
            }
        })
        .collect();

    let document = SbmlOut {
        xmlns: "http://www.sbml.org/sbml/level3/version1/core",
        level: 3,
        version: 1,
        model: ModelOut {
            id: model.id.clone(),
            parameters: ParameterListOut {
                parameters: parameters
                    .into_iter()
                    .map(|(id, value)| ParameterOut {
                        id,
                        value,
                        constant: true,
                    })
                    .collect(),
            },
            species: SpeciesListOut {
                species: model
                    .metabolites
                    .iter()
                    .map(|met| SpeciesOut {
                        id: sbml_id("M_", &met.id),
                        name: met.name.clone(),
                        compartment: met.compartment.clone(),
                    })
                    .collect(),
            },
            reactions: ReactionListOut { reactions },
        },
    };

    let body = quick_xml::se::to_string(&document)
        .map_err(|e| anyhow!("Could not serialize model '{}': {e}", model.id))?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}\n"))
}

/// Structural id -> SBML id: prefix plus the character escapes the solver
/// encoding uses.
fn sbml_id(prefix: &str, id: &str) -> String {
    let escaped = id
        .replace('-', "__45__")
        .replace('.', "__46__")
        .replace('+', "__43__");
    format!("{prefix}{escaped}")
}

#[derive(Serialize)]
#[serde(rename = "sbml")]
struct SbmlOut {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@level")]
    level: u8,
    #[serde(rename = "@version")]
    version: u8,
    model: ModelOut,
}

#[derive(Serialize)]
struct ModelOut {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "listOfParameters")]
    parameters: ParameterListOut,
    #[serde(rename = "listOfSpecies")]
    species: SpeciesListOut,
    #[serde(rename = "listOfReactions")]
    reactions: ReactionListOut,
}

#[derive(Serialize)]
struct ParameterListOut {
    #[serde(rename = "parameter")]
    parameters: Vec<ParameterOut>,
}

#[derive(Serialize)]
struct ParameterOut {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@value")]
    value: f64,
    #[serde(rename = "@constant")]
    constant: bool,
}

#[derive(Serialize)]
struct SpeciesListOut {
    #[serde(rename = "species")]
    species: Vec<SpeciesOut>,
}

#[derive(Serialize)]
struct SpeciesOut {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "@compartment", skip_serializing_if = "Option::is_none")]
    compartment: Option<String>,
}

#[derive(Serialize)]
struct ReactionListOut {
    #[serde(rename = "reaction")]
    reactions: Vec<ReactionOut>,
}

#[derive(Serialize)]
struct ReactionOut {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "@reversible")]
    reversible: bool,
    #[serde(rename = "@fbc:lowerFluxBound")]
    lower_flux_bound: String,
    #[serde(rename = "@fbc:upperFluxBound")]
    upper_flux_bound: String,
    #[serde(rename = "listOfReactants", skip_serializing_if = "Option::is_none")]
    reactants: Option<SpeciesRefListOut>,
    #[serde(rename = "listOfProducts", skip_serializing_if = "Option::is_none")]
    products: Option<SpeciesRefListOut>,
}

#[derive(Serialize)]
struct SpeciesRefListOut {
    #[serde(rename = "speciesReference")]
    references: Vec<SpeciesRefOut>,
}

#[derive(Serialize)]
struct SpeciesRefOut {
    #[serde(rename = "@species")]
    species: String,
    #[serde(rename = "@stoichiometry")]
    stoichiometry: f64,
}
