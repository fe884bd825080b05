//! SBML reader for the universal reaction network.
//!
//! This module intentionally supports only the subset the universal model is
//! shipped in: SBML Level 3 with the `fbc` flux-bound indirection through
//! `listOfParameters`, and RDF `bqbiol:is` CV terms pointing at
//! identifiers.org resources. Non-SBML documents are detected and rejected
//! with explicit diagnostics so loading behavior stays deterministic.
//!
//! Identifiers are normalized into the structural view on the way in: the
//! `M_`/`R_` prefixes are stripped and the `__45__`/`__46__`/`__43__` escapes
//! are decoded back to `-`, `.` and `+`. Annotation namespaces keep only the
//! provider code's first dot-segment (`bigg.metabolite` becomes `bigg`), and
//! prefixed tokens such as `CHEBI:17634` are stored both verbatim and bare so
//! either spelling resolves.

use crate::universe::{DEFAULT_BOUND, NetworkSnapshot, UniversalMetabolite, UniversalReaction};
use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SbmlDialect {
    Sbml,
    Unknown,
}

pub fn detect_sbml_dialect(input: &str) -> SbmlDialect {
    if input.to_ascii_lowercase().contains("<sbml") {
        SbmlDialect::Sbml
    } else {
        SbmlDialect::Unknown
    }
}

pub fn parse_sbml_file(path: &Path) -> Result<NetworkSnapshot> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Could not read SBML file '{}': {e}", path.display()))?;
    parse_sbml_text(&text).map_err(|e| anyhow!("Could not parse SBML file '{}': {e}", path.display()))
}

pub fn parse_sbml_text(xml: &str) -> Result<NetworkSnapshot> {
    if detect_sbml_dialect(xml) == SbmlDialect::Unknown {
        return Err(anyhow!("Unsupported XML dialect: expected an <sbml> root element"));
    }

    let parsed: SbmlXml =
        quick_xml::de::from_str(xml).map_err(|e| anyhow!("Malformed SBML: {e}"))?;
    let model = parsed.model;

    let parameters: HashMap<String, f64> = model
        .parameters
        .map(|list| list.parameters)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.value.map(|v| (p.id, v)))
        .collect();

    let metabolites: Vec<UniversalMetabolite> = model
        .species
        .map(|list| list.species)
        .unwrap_or_default()
        .into_iter()
        .map(|species| UniversalMetabolite {
            id: structural_id(&species.id, "M_"),
            name: species.name,
            compartment: species.compartment,
            annotation: collect_annotation(species.annotation.as_ref()),
        })
        .collect();

    let reactions: Vec<UniversalReaction> = model
        .reactions
        .map(|list| list.reactions)
        .unwrap_or_default()
        .into_iter()
        .map(|reaction| reaction_to_universal(reaction, &parameters))
        .collect::<Result<_>>()?;

    if reactions.is_empty() {
        return Err(anyhow!("Malformed SBML: no reactions found"));
    }

    Ok(NetworkSnapshot {
        metabolites,
        reactions,
    })
}

#[derive(Debug, Deserialize)]
struct SbmlXml {
    #[serde(rename = "model")]
    model: ModelXml,
}

#[derive(Debug, Deserialize)]
struct ModelXml {
    #[serde(rename = "listOfParameters")]
    parameters: Option<ParameterListXml>,
    #[serde(rename = "listOfSpecies")]
    species: Option<SpeciesListXml>,
    #[serde(rename = "listOfReactions")]
    reactions: Option<ReactionListXml>,
}

#[derive(Debug, Deserialize)]
struct ParameterListXml {
    #[serde(rename = "parameter", default)]
    parameters: Vec<ParameterXml>,
}

#[derive(Debug, Deserialize)]
struct ParameterXml {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@value")]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SpeciesListXml {
    #[serde(rename = "species", default)]
    species: Vec<SpeciesXml>,
}

#[derive(Debug, Deserialize)]
struct SpeciesXml {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@compartment")]
    compartment: Option<String>,
    #[serde(rename = "annotation")]
    annotation: Option<AnnotationXml>,
}

#[derive(Debug, Deserialize)]
struct ReactionListXml {
    #[serde(rename = "reaction", default)]
    reactions: Vec<ReactionXml>,
}

#[derive(Debug, Deserialize)]
struct ReactionXml {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@reversible")]
    reversible: Option<bool>,
    #[serde(rename = "@lowerFluxBound")]
    lower_flux_bound: Option<String>,
    #[serde(rename = "@upperFluxBound")]
    upper_flux_bound: Option<String>,
    #[serde(rename = "listOfReactants")]
    reactants: Option<SpeciesRefListXml>,
    #[serde(rename = "listOfProducts")]
    products: Option<SpeciesRefListXml>,
    #[serde(rename = "annotation")]
    annotation: Option<AnnotationXml>,
}

#[derive(Debug, Deserialize)]
struct SpeciesRefListXml {
    #[serde(rename = "speciesReference", default)]
    references: Vec<SpeciesRefXml>,
}

#[derive(Debug, Deserialize)]
struct SpeciesRefXml {
    #[serde(rename = "@species")]
    species: String,
    #[serde(rename = "@stoichiometry")]
    stoichiometry: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AnnotationXml {
    #[serde(rename = "RDF")]
    rdf: Option<RdfXml>,
}

#[derive(Debug, Deserialize)]
struct RdfXml {
    #[serde(rename = "Description", default)]
    descriptions: Vec<RdfDescriptionXml>,
}

#[derive(Debug, Deserialize)]
struct RdfDescriptionXml {
    #[serde(rename = "is", default)]
    is_terms: Vec<BqbiolTermXml>,
}

#[derive(Debug, Deserialize)]
struct BqbiolTermXml {
    #[serde(rename = "Bag")]
    bag: Option<RdfBagXml>,
}

#[derive(Debug, Deserialize)]
struct RdfBagXml {
    #[serde(rename = "li", default)]
    items: Vec<RdfLiXml>,
}

#[derive(Debug, Deserialize)]
struct RdfLiXml {
    #[serde(rename = "@resource")]
    resource: Option<String>,
}

fn reaction_to_universal(
    reaction: ReactionXml,
    parameters: &HashMap<String, f64>,
) -> Result<UniversalReaction> {
    let (lower_bound, upper_bound) = resolve_bounds(&reaction, parameters)?;

    let mut metabolites = IndexMap::new();
    for reference in reaction
        .reactants
        .as_ref()
        .map(|list| list.references.as_slice())
        .unwrap_or_default()
    {
        let coefficient = reference.stoichiometry.unwrap_or(1.0);
        *metabolites
            .entry(structural_id(&reference.species, "M_"))
            .or_insert(0.0) -= coefficient;
    }
    for reference in reaction
        .products
        .as_ref()
        .map(|list| list.references.as_slice())
        .unwrap_or_default()
    {
        let coefficient = reference.stoichiometry.unwrap_or(1.0);
        *metabolites
            .entry(structural_id(&reference.species, "M_"))
            .or_insert(0.0) += coefficient;
    }

    Ok(UniversalReaction {
        id: structural_id(&reaction.id, "R_"),
        name: reaction.name,
        metabolites,
        lower_bound,
        upper_bound,
        annotation: collect_annotation(reaction.annotation.as_ref()),
    })
}

fn resolve_bounds(
    reaction: &ReactionXml,
    parameters: &HashMap<String, f64>,
) -> Result<(f64, f64)> {
    match (&reaction.lower_flux_bound, &reaction.upper_flux_bound) {
        (Some(lower_ref), Some(upper_ref)) => {
            let lower = *parameters.get(lower_ref).ok_or_else(|| {
                anyhow!(
                    "Reaction '{}' references unknown flux bound parameter '{}'",
                    reaction.id,
                    lower_ref
                )
            })?;
            let upper = *parameters.get(upper_ref).ok_or_else(|| {
                anyhow!(
                    "Reaction '{}' references unknown flux bound parameter '{}'",
                    reaction.id,
                    upper_ref
                )
            })?;
            Ok((lower, upper))
        }
        (None, None) => {
            // No fbc indirection: fall back to the reversibility flag.
            if reaction.reversible.unwrap_or(true) {
                Ok((-DEFAULT_BOUND, DEFAULT_BOUND))
            } else {
                Ok((0.0, DEFAULT_BOUND))
            }
        }
        _ => Err(anyhow!(
            "Reaction '{}' carries only one of fbc:lowerFluxBound/fbc:upperFluxBound",
            reaction.id
        )),
    }
}

/// Strip the SBML id prefix and decode the character escapes back into the
/// structural spelling.
fn structural_id(raw: &str, prefix: &str) -> String {
    raw.strip_prefix(prefix)
        .unwrap_or(raw)
        .replace("__45__", "-")
        .replace("__46__", ".")
        .replace("__43__", "+")
}

fn collect_annotation(annotation: Option<&AnnotationXml>) -> IndexMap<String, Vec<String>> {
    let mut out: IndexMap<String, Vec<String>> = IndexMap::new();
    let Some(rdf) = annotation.and_then(|a| a.rdf.as_ref()) else {
        return out;
    };
    for description in &rdf.descriptions {
        for term in &description.is_terms {
            let items = term
                .bag
                .as_ref()
                .map(|bag| bag.items.as_slice())
                .unwrap_or_default();
            for item in items {
                let Some(resource) = item.resource.as_deref() else {
                    continue;
                };
                let Some((namespace, ids)) = parse_resource_uri(resource) else {
                    continue;
                };
                let entry = out.entry(namespace).or_default();
                for id in ids {
                    if !entry.contains(&id) {
                        entry.push(id);
                    }
                }
            }
        }
    }
    out
}

/// Split one identifiers.org resource URI into a namespace and the stored id
/// spellings. `https://identifiers.org/chebi/CHEBI:17634` yields namespace
/// `chebi` with both `CHEBI:17634` and `17634`; a tail without any namespace
/// segment lands under the empty namespace.
fn parse_resource_uri(uri: &str) -> Option<(String, Vec<String>)> {
    let tail = uri.split("identifiers.org/").nth(1)?.trim_matches('/');
    if tail.is_empty() {
        return None;
    }
    if let Some((namespace, id)) = tail.rsplit_once('/') {
        if id.is_empty() || namespace.is_empty() {
            return None;
        }
        let namespace = namespace
            .split('.')
            .next()
            .unwrap_or(namespace)
            .to_lowercase();
        Some((namespace, expand_prefixed_id(id)))
    } else if let Some((prefix, _)) = tail.split_once(':') {
        Some((prefix.to_lowercase(), expand_prefixed_id(tail)))
    } else {
        Some((String::new(), vec![tail.to_string()]))
    }
}

fn expand_prefixed_id(id: &str) -> Vec<String> {
    match id.split_once(':') {
        Some((_, bare)) if !bare.is_empty() => vec![id.to_string(), bare.to_string()],
        _ => vec![id.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOY_XML: &str = include_str!("../test_files/universal_toy.xml");

    #[test]
    fn test_detect_sbml_dialect() {
        assert_eq!(detect_sbml_dialect("<sbml level=\"3\"/>"), SbmlDialect::Sbml);
        assert_eq!(
            detect_sbml_dialect("<GBSet><GBSeq/></GBSet>"),
            SbmlDialect::Unknown
        );
    }

    #[test]
    fn test_rejects_non_sbml_document() {
        let err = parse_sbml_text("<GBSet><GBSeq/></GBSet>").unwrap_err();
        assert!(err.to_string().contains("Unsupported XML dialect"));
    }

    #[test]
    fn test_parse_toy_model_ids_and_bounds() {
        let snapshot = parse_sbml_text(TOY_XML).unwrap();
        assert_eq!(snapshot.metabolites.len(), 3);
        assert_eq!(snapshot.reactions.len(), 4);

        let ids: Vec<&str> = snapshot.reactions.iter().map(|r| r.id.as_str()).collect();
        // Prefixes stripped and escapes decoded.
        assert!(ids.contains(&"GLUCOKIN-RXN_forwardTemp"));
        assert!(ids.contains(&"EX_glc__D_e_forwardTemp"));

        let glucokinase = snapshot
            .reactions
            .iter()
            .find(|r| r.id == "GLUCOKIN-RXN_forwardTemp")
            .unwrap();
        assert_eq!(glucokinase.lower_bound, 0.0);
        assert_eq!(glucokinase.upper_bound, 1000.0);
        assert_eq!(glucokinase.metabolites.get("glc__D_e"), Some(&-1.0));
        assert_eq!(glucokinase.metabolites.get("g6p_c"), Some(&1.0));
    }

    #[test]
    fn test_parse_toy_model_annotations() {
        let snapshot = parse_sbml_text(TOY_XML).unwrap();
        let glucose = snapshot
            .metabolites
            .iter()
            .find(|m| m.id == "glc__D_e")
            .unwrap();
        // Provider codes normalized to their first dot-segment.
        assert_eq!(glucose.annotation.get("bigg").unwrap(), &vec!["glc__D".to_string()]);
        assert_eq!(glucose.annotation.get("kegg").unwrap(), &vec!["C00031".to_string()]);
        assert_eq!(glucose.annotation.get("seed").unwrap(), &vec!["cpd00027".to_string()]);
        // Prefixed tokens stored verbatim and bare.
        assert_eq!(
            glucose.annotation.get("chebi").unwrap(),
            &vec!["CHEBI:17634".to_string(), "17634".to_string()]
        );

        let glucokinase = snapshot
            .reactions
            .iter()
            .find(|r| r.id == "GLUCOKIN-RXN_forwardTemp")
            .unwrap();
        assert_eq!(
            glucokinase.annotation.get("metacyc").unwrap(),
            &vec!["GLUCOKIN-RXN".to_string()]
        );
        assert_eq!(
            glucokinase.annotation.get("rhea").unwrap(),
            &vec!["17825".to_string()]
        );
    }

    #[test]
    fn test_exchange_reaction_sides_set_coefficient_signs() {
        let snapshot = parse_sbml_text(TOY_XML).unwrap();
        let uptake = snapshot
            .reactions
            .iter()
            .find(|r| r.id == "EX_glc__D_e_forwardTemp")
            .unwrap();
        assert_eq!(uptake.metabolites.get("glc__D_e"), Some(&-1.0));
        let release = snapshot
            .reactions
            .iter()
            .find(|r| r.id == "EX_glc__D_e_reverseTemp")
            .unwrap();
        assert_eq!(release.metabolites.get("glc__D_e"), Some(&1.0));
    }

    #[test]
    fn test_unknown_bound_parameter_is_an_error() {
        let xml = r#"<?xml version="1.0"?>
<sbml xmlns="http://www.sbml.org/sbml/level3/version1/core" level="3" version="1">
  <model id="broken">
    <listOfReactions>
      <reaction id="R_A" reversible="false" fbc:lowerFluxBound="nope" fbc:upperFluxBound="nope"/>
    </listOfReactions>
  </model>
</sbml>"#;
        let err = parse_sbml_text(xml).unwrap_err();
        assert!(err.to_string().contains("unknown flux bound parameter"));
    }

    #[test]
    fn test_reversibility_fallback_without_fbc_bounds() {
        let xml = r#"<?xml version="1.0"?>
<sbml xmlns="http://www.sbml.org/sbml/level3/version1/core" level="3" version="1">
  <model id="plain">
    <listOfReactions>
      <reaction id="R_A" reversible="true"/>
      <reaction id="R_B" reversible="false"/>
    </listOfReactions>
  </model>
</sbml>"#;
        let snapshot = parse_sbml_text(xml).unwrap();
        assert_eq!(snapshot.reactions[0].lower_bound, -1000.0);
        assert_eq!(snapshot.reactions[0].upper_bound, 1000.0);
        assert_eq!(snapshot.reactions[1].lower_bound, 0.0);
    }

    #[test]
    fn test_parse_resource_uri_forms() {
        assert_eq!(
            parse_resource_uri("https://identifiers.org/rhea/10031"),
            Some(("rhea".to_string(), vec!["10031".to_string()]))
        );
        assert_eq!(
            parse_resource_uri("https://identifiers.org/bigg.metabolite/glc__D"),
            Some(("bigg".to_string(), vec!["glc__D".to_string()]))
        );
        assert_eq!(
            parse_resource_uri("https://identifiers.org/CHEBI:17634"),
            Some((
                "chebi".to_string(),
                vec!["CHEBI:17634".to_string(), "17634".to_string()]
            ))
        );
        assert_eq!(
            parse_resource_uri("https://identifiers.org/10031"),
            Some(("".to_string(), vec!["10031".to_string()]))
        );
        assert_eq!(parse_resource_uri("https://example.org/other"), None);
    }
}
