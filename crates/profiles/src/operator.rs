//! Rule operators.

use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::rule::RuleEvaluationError;

/// Comparison applied by a [`crate::DataRequirementRule`].
///
/// Serialized as its variant name (`"GreaterThan"`). Parsing accepts any
/// casing and rejects anything that is not one of the seven names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl RuleOperator {
    /// Every operator, in declaration order.
    pub const ALL: [RuleOperator; 7] = [
        RuleOperator::Equals,
        RuleOperator::NotEquals,
        RuleOperator::Contains,
        RuleOperator::GreaterThan,
        RuleOperator::GreaterThanOrEqual,
        RuleOperator::LessThan,
        RuleOperator::LessThanOrEqual,
    ];

    pub fn all() -> &'static [RuleOperator] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleOperator::Equals => "Equals",
            RuleOperator::NotEquals => "NotEquals",
            RuleOperator::Contains => "Contains",
            RuleOperator::GreaterThan => "GreaterThan",
            RuleOperator::GreaterThanOrEqual => "GreaterThanOrEqual",
            RuleOperator::LessThan => "LessThan",
            RuleOperator::LessThanOrEqual => "LessThanOrEqual",
        }
    }

    /// Whether both operands must be numbers.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            RuleOperator::GreaterThan
                | RuleOperator::GreaterThanOrEqual
                | RuleOperator::LessThan
                | RuleOperator::LessThanOrEqual
        )
    }
}

impl core::fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleOperator {
    type Err = RuleEvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| RuleEvaluationError::UnknownOperator(s.to_string()))
    }
}

impl Serialize for RuleOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RuleOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
