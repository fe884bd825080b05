use std::error::Error;
use std::fmt;

/// Which cross-field rule a constraint record broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRule {
    MetaboliteWithoutDirection,
    DirectionWithoutMetabolite,
    ReactionWithoutReactionGroup,
    ReactionGroupWithoutReactionId,
}

#[derive(Debug)]
pub enum ConstraintError {
    MalformedRecord { line: String },
    InvalidIdentifier { line: String },
    GroupMismatch { rule: GroupRule, line: String },
    UnknownPathway { line: String },
    InvalidConstraintType { line: String },
    InvalidScore { line: String },
    Io { path: String, source: std::io::Error },
}

impl Error for ConstraintError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConstraintError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConstraintError::MalformedRecord { line } => write!(
                f,
                "Constraint records need 4 columns separated by tabs, \
                 for example: \"M_na\tSoft\t1\tMedia\". Input given: {line}"
            ),
            ConstraintError::InvalidIdentifier { line } => write!(
                f,
                "The first column holds the ID of a reaction or metabolite. \
                 Reaction IDs start with \"R_\", metabolite IDs with \"M_\"; \
                 BiGG, SEED, ChEBI, KEGG and Rhea IDs are accepted, \
                 for example: \"M_na\". Input given: {line}"
            ),
            ConstraintError::GroupMismatch { rule, line } => match rule {
                GroupRule::MetaboliteWithoutDirection => write!(
                    f,
                    "A metabolite constraint needs the last column to say whether \
                     the metabolite is consumed (keyword \"Media\") or produced \
                     (keyword \"Product\"), for example: \"M_na\tSoft\t1\tMedia\". \
                     Input given: {line}"
                ),
                GroupRule::DirectionWithoutMetabolite => write!(
                    f,
                    "The last column declares a consumed/produced metabolite, but the \
                     ID in the first column does not match the format of a metabolite \
                     ID. Metabolite IDs start with \"M_\". Example of correct input: \
                     \"M_61988_e\tSoft\t0.1\tMedia\". Input given: {line}"
                ),
                GroupRule::ReactionWithoutReactionGroup => write!(
                    f,
                    "The ID in the first column seems to be of a reaction, but this is \
                     not the information given in the last column. Example of correct \
                     input: \"R_R09640\tSoft\t3\tReaction\". Input given: {line}"
                ),
                GroupRule::ReactionGroupWithoutReactionId => write!(
                    f,
                    "The last column says \"Reaction\", but the ID in the first column \
                     does not match the format of a reaction ID. Reaction IDs start \
                     with \"R_\". Example of correct input: \
                     \"R_R09640\tSoft\t3\tReaction\". Input given: {line}"
                ),
            },
            ConstraintError::UnknownPathway { line } => write!(
                f,
                "Pathway ID was not recognized either as a MetaCyc pathway or as a \
                 KEGG module. Input given: {line}"
            ),
            ConstraintError::InvalidConstraintType { line } => write!(
                f,
                "The second column says whether the constraint is \"soft\" (the model \
                 will try to satisfy it) or \"hard\" (the model will necessarily \
                 satisfy it), for example: \"R_R09640\tSoft\t3\tReaction\". \
                 Input given: {line}"
            ),
            ConstraintError::InvalidScore { line } => write!(
                f,
                "The third column holds the numeric reaction score. For a metabolite \
                 the score goes to the reactions producing or consuming it; for a hard \
                 constraint only the score sign decides whether the reaction is \
                 included or avoided. For example: \"R_R09640\tSoft\t3\tReaction\". \
                 Input given: {line}"
            ),
            ConstraintError::Io { path, source } => {
                write!(f, "Could not read constraints file '{path}': {source}")
            }
        }
    }
}
