use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sextant_core::error::{limit_text, require_text};
use sextant_core::{
    AggregateRoot, DataRequirementId, DomainError, DomainResult, Entity, ProfileId, UserId,
};

use crate::rule::{Candidate, DataRequirementRule, RuleEvaluationError};

pub const NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const RESOURCE_TYPE_MAX_LEN: usize = 100;
pub const OWNER_NAME_MAX_LEN: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Owner
// ─────────────────────────────────────────────────────────────────────────────

/// The user a profile belongs to, with their display name denormalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOwner {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
}

impl ProfileOwner {
    pub fn new(user_id: UserId, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            user_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    fn validate(&self) -> DomainResult<()> {
        if self.user_id.is_nil() {
            return Err(DomainError::validation("owner.userId is required"));
        }
        require_text("owner.firstName", &self.first_name, OWNER_NAME_MAX_LEN)?;
        require_text("owner.lastName", &self.last_name, OWNER_NAME_MAX_LEN)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Data requirement
// ─────────────────────────────────────────────────────────────────────────────

/// A resource type a profile needs, narrowed by rules. Owned by one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequirement {
    pub id: DataRequirementId,
    pub resource_type: String,
    pub rules: Vec<DataRequirementRule>,
}

impl Entity for DataRequirement {
    type Id = DataRequirementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl DataRequirement {
    pub fn new(resource_type: impl Into<String>, rules: Vec<DataRequirementRule>) -> Self {
        Self {
            id: DataRequirementId::new(),
            resource_type: resource_type.into(),
            rules,
        }
    }

    fn validate(&self) -> DomainResult<()> {
        require_text("resourceType", &self.resource_type, RESOURCE_TYPE_MAX_LEN)
    }

    /// A candidate matches when its resource type is equal and every rule holds.
    ///
    /// Rules are checked in order; the first `false` or the first error wins.
    pub fn matches(&self, candidate: &Candidate) -> Result<bool, RuleEvaluationError> {
        if candidate.resource_type != self.resource_type {
            return Ok(false);
        }
        for rule in &self.rules {
            if !rule.evaluate_against(candidate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Result of matching one requirement against a set of candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementOutcome {
    pub requirement_id: DataRequirementId,
    pub resource_type: String,
    pub matched: bool,
    pub matching_candidates: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate root: Profile.
///
/// # Invariants
/// - `id` never changes once assigned.
/// - exactly one owner, fixed at creation.
/// - data requirements live and die with the profile; updates replace the
///   whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub owner: ProfileOwner,
    pub data_requirements: Vec<DataRequirement>,
    pub created_on: DateTime<Utc>,
    pub modified_on: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn new(name: impl Into<String>, owner: ProfileOwner) -> Self {
        Self {
            id: ProfileId::new(),
            name: name.into(),
            description: None,
            is_public: false,
            owner,
            data_requirements: Vec::new(),
            created_on: Utc::now(),
            modified_on: None,
        }
    }

    pub fn with_requirement(mut self, requirement: DataRequirement) -> Self {
        self.data_requirements.push(requirement);
        self
    }

    /// Assign missing identities and stamp the creation time.
    pub fn prepare_for_insert(&mut self, now: DateTime<Utc>) {
        self.id = self.id.or_new();
        for requirement in &mut self.data_requirements {
            requirement.id = requirement.id.or_new();
        }
        self.created_on = now;
        self.modified_on = None;
    }

    /// Replace the mutable state of this profile with `incoming`.
    ///
    /// Identity, owner and creation time are kept; everything else,
    /// including the full requirement list, comes from `incoming`.
    pub fn apply_update(&mut self, incoming: Profile, now: DateTime<Utc>) {
        self.name = incoming.name;
        self.description = incoming.description;
        self.is_public = incoming.is_public;
        self.data_requirements = incoming
            .data_requirements
            .into_iter()
            .map(|mut requirement| {
                requirement.id = requirement.id.or_new();
                requirement
            })
            .collect();
        self.modified_on = Some(now);
    }

    /// Match every requirement against `candidates`.
    ///
    /// A requirement is satisfied when at least one candidate matches it.
    pub fn evaluate(&self, candidates: &[Candidate]) -> Result<Vec<RequirementOutcome>, RuleEvaluationError> {
        self.data_requirements
            .iter()
            .map(|requirement| {
                let mut matching = 0;
                for candidate in candidates {
                    if requirement.matches(candidate)? {
                        matching += 1;
                    }
                }
                Ok(RequirementOutcome {
                    requirement_id: requirement.id,
                    resource_type: requirement.resource_type.clone(),
                    matched: matching > 0,
                    matching_candidates: matching,
                })
            })
            .collect()
    }
}

impl AggregateRoot for Profile {
    type Id = ProfileId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn validate(&self) -> DomainResult<()> {
        require_text("name", &self.name, NAME_MAX_LEN)?;
        if let Some(description) = &self.description {
            limit_text("description", description, DESCRIPTION_MAX_LEN)?;
        }
        self.owner.validate()?;
        for requirement in &self.data_requirements {
            requirement.validate()?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sorting
// ─────────────────────────────────────────────────────────────────────────────

/// Sort key for profile listings. Always ascending, ties broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileSort {
    Name,
    CreatedOn,
    #[default]
    Id,
}

impl ProfileSort {
    /// Case-insensitive; anything unrecognised (including empty) sorts by id.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("name") {
            ProfileSort::Name
        } else if raw.eq_ignore_ascii_case("createdOn") {
            ProfileSort::CreatedOn
        } else {
            ProfileSort::Id
        }
    }

    pub fn compare(self, a: &Profile, b: &Profile) -> Ordering {
        let primary = match self {
            ProfileSort::Name => a.name.cmp(&b.name),
            ProfileSort::CreatedOn => a.created_on.cmp(&b.created_on),
            ProfileSort::Id => Ordering::Equal,
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::RuleOperator;
    use chrono::TimeZone;
    use sextant_core::DomainError;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn glucose_requirement() -> DataRequirement {
        DataRequirement::new(
            "Observation",
            vec![
                DataRequirementRule::new("code", RuleOperator::Equals, Some("2345-7")),
                DataRequirementRule::new("value", RuleOperator::GreaterThan, Some("126")),
            ],
        )
    }

    fn diabetes_cohort() -> Profile {
        Profile::new(
            "Diabetes Cohort",
            ProfileOwner::new(UserId::new(), "Ada", "Lovelace"),
        )
        .with_requirement(glucose_requirement())
    }

    #[test]
    fn prepare_for_insert_assigns_missing_ids() {
        let mut profile = diabetes_cohort();
        profile.id = ProfileId::nil();
        profile.data_requirements[0].id = DataRequirementId::nil();

        profile.prepare_for_insert(test_time());

        assert!(!profile.id.is_nil());
        assert!(!profile.data_requirements[0].id.is_nil());
        assert_eq!(profile.created_on, test_time());
        assert_eq!(profile.modified_on, None);
    }

    #[test]
    fn prepare_for_insert_keeps_supplied_ids() {
        let mut profile = diabetes_cohort();
        let id = profile.id;
        profile.prepare_for_insert(test_time());
        assert_eq!(profile.id, id);
    }

    #[test]
    fn validate_rejects_blank_or_long_name() {
        let mut profile = diabetes_cohort();
        profile.name = "  ".to_string();
        assert_eq!(profile.validate(), Err(DomainError::validation("name is required")));

        profile.name = "x".repeat(NAME_MAX_LEN + 1);
        assert!(matches!(profile.validate(), Err(DomainError::Validation(_))));

        profile.name = "x".repeat(NAME_MAX_LEN);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn validate_checks_description_and_requirements() {
        let mut profile = diabetes_cohort();
        profile.description = Some("d".repeat(DESCRIPTION_MAX_LEN + 1));
        assert!(profile.validate().is_err());

        profile.description = None;
        profile.data_requirements.push(DataRequirement::new("", vec![]));
        assert_eq!(
            profile.validate(),
            Err(DomainError::validation("resourceType is required"))
        );
    }

    #[test]
    fn validate_requires_a_complete_owner() {
        let mut profile = diabetes_cohort();
        profile.owner = ProfileOwner::default();
        assert_eq!(
            profile.validate(),
            Err(DomainError::validation("owner.userId is required"))
        );

        profile.owner = ProfileOwner::new(UserId::new(), " ", "Lovelace");
        assert_eq!(
            profile.validate(),
            Err(DomainError::validation("owner.firstName is required"))
        );

        profile.owner = ProfileOwner::new(UserId::new(), "Ada", "");
        assert_eq!(
            profile.validate(),
            Err(DomainError::validation("owner.lastName is required"))
        );
    }

    #[test]
    fn apply_update_replaces_requirements_and_keeps_owner() {
        let mut stored = diabetes_cohort();
        stored.prepare_for_insert(test_time());
        let owner = stored.owner.clone();
        let id = stored.id;

        let mut incoming = diabetes_cohort();
        incoming.id = id;
        incoming.name = "Renamed".to_string();
        incoming.is_public = true;
        incoming.owner = ProfileOwner::new(UserId::new(), "Someone", "Else");
        incoming.data_requirements.clear();

        let later = test_time() + chrono::Duration::hours(1);
        stored.apply_update(incoming, later);

        assert_eq!(stored.id, id);
        assert_eq!(stored.name, "Renamed");
        assert!(stored.is_public);
        assert_eq!(stored.owner, owner);
        assert!(stored.data_requirements.is_empty());
        assert_eq!(stored.created_on, test_time());
        assert_eq!(stored.modified_on, Some(later));
    }

    #[test]
    fn requirement_matches_only_its_resource_type() {
        let requirement = glucose_requirement();
        let observation = Candidate::new("Observation")
            .with_property("code", Some("2345-7"))
            .with_property("value", Some("140"));
        let patient = Candidate::new("Patient").with_property("value", Some("140"));

        assert!(requirement.matches(&observation).unwrap());
        assert!(!requirement.matches(&patient).unwrap());
    }

    #[test]
    fn requirement_short_circuits_on_first_failed_rule() {
        // `code` fails first, so the non-numeric `value` is never evaluated.
        let requirement = glucose_requirement();
        let candidate = Candidate::new("Observation")
            .with_property("code", Some("other"))
            .with_property("value", Some("high"));
        assert!(!requirement.matches(&candidate).unwrap());
    }

    #[test]
    fn profile_evaluate_reports_each_requirement() {
        let mut profile = diabetes_cohort();
        profile
            .data_requirements
            .push(DataRequirement::new("Condition", vec![]));

        let candidates = vec![
            Candidate::new("Observation")
                .with_property("code", Some("2345-7"))
                .with_property("value", Some("200")),
            Candidate::new("Observation")
                .with_property("code", Some("2345-7"))
                .with_property("value", Some("90")),
        ];

        let outcomes = profile.evaluate(&candidates).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].matched);
        assert_eq!(outcomes[0].matching_candidates, 1);
        assert!(!outcomes[1].matched);
    }

    #[test]
    fn profile_evaluate_propagates_rule_errors() {
        let profile = diabetes_cohort();
        let candidates = vec![Candidate::new("Observation")
            .with_property("code", Some("2345-7"))
            .with_property("value", Some("n/a"))];
        assert!(matches!(
            profile.evaluate(&candidates),
            Err(RuleEvaluationError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn sort_parse_is_case_insensitive_with_id_fallback() {
        assert_eq!(ProfileSort::parse("name"), ProfileSort::Name);
        assert_eq!(ProfileSort::parse("NAME"), ProfileSort::Name);
        assert_eq!(ProfileSort::parse("CreatedOn"), ProfileSort::CreatedOn);
        assert_eq!(ProfileSort::parse("createdon"), ProfileSort::CreatedOn);
        assert_eq!(ProfileSort::parse(""), ProfileSort::Id);
        assert_eq!(ProfileSort::parse("description"), ProfileSort::Id);
    }

    #[test]
    fn sort_breaks_ties_by_id() {
        let mut a = diabetes_cohort();
        let mut b = diabetes_cohort();
        a.id = ProfileId::from_uuid(uuid_from(1));
        b.id = ProfileId::from_uuid(uuid_from(2));
        assert_eq!(ProfileSort::Name.compare(&a, &b), Ordering::Less);
        assert_eq!(ProfileSort::Name.compare(&b, &a), Ordering::Greater);
    }

    fn uuid_from(n: u128) -> uuid::Uuid {
        uuid::Uuid::from_u128(n)
    }
}
