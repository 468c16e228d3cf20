//! Profiles bounded context: profiles, their data requirements, and the rule
//! engine that decides whether a candidate resource satisfies a requirement.

pub mod operator;
pub mod profile;
pub mod rule;

pub use operator::RuleOperator;
pub use profile::{
    DataRequirement, Profile, ProfileOwner, ProfileSort, RequirementOutcome, NAME_MAX_LEN,
    DESCRIPTION_MAX_LEN, RESOURCE_TYPE_MAX_LEN,
};
pub use rule::{Candidate, DataRequirementRule, OperandSide, RuleEvaluationError, evaluate};
