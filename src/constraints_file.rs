//! Parser for user-supplied constraint files.
//!
//! One record per line, four tab-separated columns: identifier, constraint
//! type (`Soft`/`Hard`), numeric score, and group (`Media`, `Product`,
//! `Reaction`, `Pathway`, or `taxonomy`, which other tooling consumes and we
//! skip). The first line is a header and always ignored. Parsing is
//! fail-fast: the first invalid record aborts with a `ConstraintError`
//! explaining the rule it broke, so a typo cannot silently weaken a
//! reconstruction.

use crate::error::{ConstraintError, GroupRule};
use crate::pathways::PathwayMembershipIndex;
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Soft,
    Hard,
}

/// Which exchange direction a metabolite constraint talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directionality {
    Media,
    Product,
    MediaAndProduct,
}

/// A record's target, classified once at parse time. Downstream code matches
/// on this instead of re-deriving the target class from identifier prefixes.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintItem {
    Metabolite { id: String, direction: Directionality },
    Reaction { id: String },
    Pathway { id_lower: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetaboliteConstraint {
    pub score: f64,
    pub direction: Directionality,
}

/// Validated constraints partitioned by target class and constraint type.
/// Metabolite and reaction keys keep the identifier's original casing with
/// the two-character prefix stripped; pathway keys are lowercased.
#[derive(Debug, Clone, Default)]
pub struct ConstraintIndex {
    pub metabolites_soft: IndexMap<String, MetaboliteConstraint>,
    pub metabolites_hard: IndexMap<String, MetaboliteConstraint>,
    pub reactions_soft: IndexMap<String, f64>,
    pub reactions_hard: IndexMap<String, f64>,
    pub pathways_soft: IndexMap<String, f64>,
    pub pathways_hard: IndexMap<String, f64>,
}

impl ConstraintIndex {
    pub fn is_empty(&self) -> bool {
        self.metabolites_soft.is_empty()
            && self.metabolites_hard.is_empty()
            && self.reactions_soft.is_empty()
            && self.reactions_hard.is_empty()
            && self.pathways_soft.is_empty()
            && self.pathways_hard.is_empty()
    }

    pub fn metabolites(&self, kind: ConstraintKind) -> &IndexMap<String, MetaboliteConstraint> {
        match kind {
            ConstraintKind::Soft => &self.metabolites_soft,
            ConstraintKind::Hard => &self.metabolites_hard,
        }
    }

    pub fn reactions(&self, kind: ConstraintKind) -> &IndexMap<String, f64> {
        match kind {
            ConstraintKind::Soft => &self.reactions_soft,
            ConstraintKind::Hard => &self.reactions_hard,
        }
    }

    pub fn pathways(&self, kind: ConstraintKind) -> &IndexMap<String, f64> {
        match kind {
            ConstraintKind::Soft => &self.pathways_soft,
            ConstraintKind::Hard => &self.pathways_hard,
        }
    }

    fn store(&mut self, kind: ConstraintKind, item: ConstraintItem, score: f64) {
        match item {
            ConstraintItem::Metabolite { id, direction } => {
                let partition = match kind {
                    ConstraintKind::Soft => &mut self.metabolites_soft,
                    ConstraintKind::Hard => &mut self.metabolites_hard,
                };
                match partition.get_mut(&id) {
                    // A metabolite constrained in both directions merges; the
                    // first record's score survives.
                    Some(existing) if existing.direction != direction => {
                        existing.direction = Directionality::MediaAndProduct;
                    }
                    _ => {
                        partition.insert(id, MetaboliteConstraint { score, direction });
                    }
                }
            }
            ConstraintItem::Reaction { id } => {
                let partition = match kind {
                    ConstraintKind::Soft => &mut self.reactions_soft,
                    ConstraintKind::Hard => &mut self.reactions_hard,
                };
                partition.insert(id, score);
            }
            ConstraintItem::Pathway { id_lower } => {
                let partition = match kind {
                    ConstraintKind::Soft => &mut self.pathways_soft,
                    ConstraintKind::Hard => &mut self.pathways_hard,
                };
                partition.insert(id_lower, score);
            }
        }
    }
}

pub fn load_constraints_file(
    path: &Path,
    pathways: &PathwayMembershipIndex,
) -> Result<ConstraintIndex, ConstraintError> {
    let text = fs::read_to_string(path).map_err(|source| ConstraintError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_constraints_text(&text, pathways)
}

pub fn parse_constraints_text(
    text: &str,
    pathways: &PathwayMembershipIndex,
) -> Result<ConstraintIndex, ConstraintError> {
    let mut index = ConstraintIndex::default();
    for line in text.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((kind, item, score)) = parse_record(line, pathways)? {
            index.store(kind, item, score);
        }
    }
    Ok(index)
}

/// Validate one record. Returns `None` for taxonomy rows, which are consumed
/// by the taxonomy channel and not this parser.
fn parse_record(
    line: &str,
    pathways: &PathwayMembershipIndex,
) -> Result<Option<(ConstraintKind, ConstraintItem, f64)>, ConstraintError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 4 {
        return Err(ConstraintError::MalformedRecord {
            line: line.to_string(),
        });
    }
    if fields[3].eq_ignore_ascii_case("taxonomy") {
        return Ok(None);
    }

    let item_id = fields[0];
    let kind_raw = fields[1].to_lowercase();
    let score_raw = fields[2];
    let group = fields[3].to_lowercase();

    if item_id.len() <= 2 {
        return Err(ConstraintError::InvalidIdentifier {
            line: line.to_string(),
        });
    }

    // get() instead of slicing: a multi-byte first character is a legal
    // start for a pathway identifier, not a prefix.
    let prefix = item_id.get(..2);
    let is_metabolite_id = prefix.is_some_and(|p| p.eq_ignore_ascii_case("m_"));
    let is_reaction_id = prefix.is_some_and(|p| p.eq_ignore_ascii_case("r_"));
    let group_is_direction = group == "media" || group == "product";

    if is_metabolite_id && !group_is_direction {
        return Err(ConstraintError::GroupMismatch {
            rule: GroupRule::MetaboliteWithoutDirection,
            line: line.to_string(),
        });
    }
    if group_is_direction && !is_metabolite_id {
        return Err(ConstraintError::GroupMismatch {
            rule: GroupRule::DirectionWithoutMetabolite,
            line: line.to_string(),
        });
    }
    if is_reaction_id && group != "reaction" {
        return Err(ConstraintError::GroupMismatch {
            rule: GroupRule::ReactionWithoutReactionGroup,
            line: line.to_string(),
        });
    }
    if group == "reaction" && !is_reaction_id {
        return Err(ConstraintError::GroupMismatch {
            rule: GroupRule::ReactionGroupWithoutReactionId,
            line: line.to_string(),
        });
    }
    if group == "pathway" && !pathways.contains(item_id) {
        return Err(ConstraintError::UnknownPathway {
            line: line.to_string(),
        });
    }

    let kind = match kind_raw.as_str() {
        "soft" => ConstraintKind::Soft,
        "hard" => ConstraintKind::Hard,
        _ => {
            return Err(ConstraintError::InvalidConstraintType {
                line: line.to_string(),
            });
        }
    };

    let score: f64 = score_raw.parse().map_err(|_| ConstraintError::InvalidScore {
        line: line.to_string(),
    })?;
    if !score.is_finite() {
        return Err(ConstraintError::InvalidScore {
            line: line.to_string(),
        });
    }

    let item = if is_metabolite_id {
        let direction = if group == "media" {
            Directionality::Media
        } else {
            Directionality::Product
        };
        ConstraintItem::Metabolite {
            id: item_id[2..].to_string(),
            direction,
        }
    } else if is_reaction_id {
        ConstraintItem::Reaction {
            id: item_id[2..].to_string(),
        }
    } else if group == "pathway" {
        ConstraintItem::Pathway {
            id_lower: item_id.to_lowercase(),
        }
    } else {
        // Unprefixed identifiers are only valid for pathway rows.
        return Err(ConstraintError::InvalidIdentifier {
            line: line.to_string(),
        });
    };

    Ok(Some((kind, item, score)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_pathways() -> PathwayMembershipIndex {
        PathwayMembershipIndex::from_json_texts(
            r#"{"M00001": {"RxnsInvolved": [[["R00299"]]]}}"#,
            r#"{"PWY-5484": {"RxnsInvolved": ["GLUCOKIN-RXN"]}}"#,
        )
        .unwrap()
    }

    fn parse(lines: &str) -> Result<ConstraintIndex, ConstraintError> {
        let text = format!("id\ttype\tscore\tgroup\n{lines}");
        parse_constraints_text(&text, &toy_pathways())
    }

    #[test]
    fn test_metabolite_record() {
        let index = parse("M_na\tSoft\t1\tMedia").unwrap();
        let entry = index.metabolites_soft.get("na").unwrap();
        assert_eq!(entry.score, 1.0);
        assert_eq!(entry.direction, Directionality::Media);
        assert!(index.metabolites_hard.is_empty());
    }

    #[test]
    fn test_prefix_is_case_insensitive_but_identifier_case_survives() {
        let index = parse("m_Na\thard\t-2\tproduct").unwrap();
        let entry = index.metabolites_hard.get("Na").unwrap();
        assert_eq!(entry.direction, Directionality::Product);
        assert_eq!(entry.score, -2.0);
    }

    #[test]
    fn test_pathway_identifier_may_start_with_a_multibyte_character() {
        let pathways = PathwayMembershipIndex::from_json_texts(
            r#"{"β-oxidation": {"RxnsInvolved": [[["R00299"]]]}}"#,
            r#"{}"#,
        )
        .unwrap();
        let text = "id\ttype\tscore\tgroup\nβ-oxidation\tSoft\t1\tPathway\n";
        let index = parse_constraints_text(text, &pathways).unwrap();
        assert_eq!(index.pathways_soft.get("β-oxidation"), Some(&1.0));
    }

    #[test]
    fn test_reaction_and_pathway_records() {
        let index = parse("R_R09640\tSoft\t3\tReaction\npwy-5484\tHard\t1\tPathway").unwrap();
        assert_eq!(index.reactions_soft.get("R09640"), Some(&3.0));
        // Pathway keys are lowercased.
        assert_eq!(index.pathways_hard.get("pwy-5484"), Some(&1.0));
    }

    #[test]
    fn test_header_blank_and_taxonomy_lines_are_skipped() {
        let text = "this header is never parsed\n\nM_na\tSoft\t1\tMedia\n\n83333\tSoft\t2\tTaxonomy\n";
        let index = parse_constraints_text(text, &toy_pathways()).unwrap();
        assert_eq!(index.metabolites_soft.len(), 1);
        assert!(index.reactions_soft.is_empty());
    }

    #[test]
    fn test_wrong_column_count_fails_fast() {
        let err = parse("M_na\tSoft\t1").unwrap_err();
        assert!(matches!(err, ConstraintError::MalformedRecord { .. }));
        // Even with a valid record after it.
        let err = parse("M_na\tSoft\nM_k\tSoft\t1\tMedia").unwrap_err();
        assert!(matches!(err, ConstraintError::MalformedRecord { .. }));
    }

    #[test]
    fn test_short_identifier_is_rejected() {
        let err = parse("M_\tSoft\t1\tMedia").unwrap_err();
        assert!(matches!(err, ConstraintError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_group_consistency_rules() {
        let err = parse("M_na\tSoft\t1\tReaction").unwrap_err();
        assert!(matches!(
            err,
            ConstraintError::GroupMismatch {
                rule: GroupRule::MetaboliteWithoutDirection,
                ..
            }
        ));

        let err = parse("ATP\tSoft\t1\tMedia").unwrap_err();
        assert!(matches!(
            err,
            ConstraintError::GroupMismatch {
                rule: GroupRule::DirectionWithoutMetabolite,
                ..
            }
        ));

        // A reaction id with a direction group trips the direction rule
        // before the reaction rule.
        let err = parse("R_R09640\tSoft\t1\tMedia").unwrap_err();
        assert!(matches!(
            err,
            ConstraintError::GroupMismatch {
                rule: GroupRule::DirectionWithoutMetabolite,
                ..
            }
        ));

        let err = parse("R_R09640\tSoft\t1\tPathway").unwrap_err();
        assert!(matches!(
            err,
            ConstraintError::GroupMismatch {
                rule: GroupRule::ReactionWithoutReactionGroup,
                ..
            }
        ));

        let err = parse("M00001\tSoft\t1\tReaction").unwrap_err();
        assert!(matches!(
            err,
            ConstraintError::GroupMismatch {
                rule: GroupRule::ReactionGroupWithoutReactionId,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_pathway_is_rejected() {
        let err = parse("PWY-0000\tSoft\t1\tPathway").unwrap_err();
        assert!(matches!(err, ConstraintError::UnknownPathway { .. }));
        assert!(parse("M00001\tSoft\t1\tPathway").is_ok());
    }

    #[test]
    fn test_unprefixed_identifier_needs_pathway_group() {
        let err = parse("M00001\tSoft\t1\tWhatever").unwrap_err();
        assert!(matches!(err, ConstraintError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_constraint_type_and_score_validation() {
        let err = parse("M_na\tMaybe\t1\tMedia").unwrap_err();
        assert!(matches!(err, ConstraintError::InvalidConstraintType { .. }));

        let err = parse("M_na\tSoft\tabc\tMedia").unwrap_err();
        assert!(matches!(err, ConstraintError::InvalidScore { .. }));

        let err = parse("M_na\tSoft\tinf\tMedia").unwrap_err();
        assert!(matches!(err, ConstraintError::InvalidScore { .. }));

        let index = parse("M_na\tSoft\t-3.5e-1\tMedia").unwrap();
        assert_eq!(index.metabolites_soft.get("na").unwrap().score, -0.35);
    }

    #[test]
    fn test_opposite_directions_merge_keeping_first_score() {
        let index = parse("M_na\tSoft\t1\tMedia\nM_na\tSoft\t5\tProduct").unwrap();
        let entry = index.metabolites_soft.get("na").unwrap();
        assert_eq!(entry.direction, Directionality::MediaAndProduct);
        assert_eq!(entry.score, 1.0);
        // Once merged, further records in either direction change nothing.
        let index = parse("M_na\tSoft\t1\tMedia\nM_na\tSoft\t5\tProduct\nM_na\tSoft\t9\tMedia")
            .unwrap();
        let entry = index.metabolites_soft.get("na").unwrap();
        assert_eq!(entry.direction, Directionality::MediaAndProduct);
        assert_eq!(entry.score, 1.0);
    }

    #[test]
    fn test_same_direction_repeat_replaces_score() {
        let index = parse("M_na\tSoft\t1\tMedia\nM_na\tSoft\t4\tMedia").unwrap();
        let entry = index.metabolites_soft.get("na").unwrap();
        assert_eq!(entry.direction, Directionality::Media);
        assert_eq!(entry.score, 4.0);
    }

    #[test]
    fn test_hard_metabolites_merge_like_soft_ones() {
        let index = parse("M_na\tHard\t1\tMedia\nM_na\tHard\t2\tProduct").unwrap();
        let entry = index.metabolites_hard.get("na").unwrap();
        assert_eq!(entry.direction, Directionality::MediaAndProduct);
        assert_eq!(entry.score, 1.0);
        assert!(index.metabolites_soft.is_empty());
    }
}
