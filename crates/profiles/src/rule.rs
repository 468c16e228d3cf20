//! Rule engine: data-requirement rules and their evaluation.
//!
//! Evaluation is pure and total over every operator. String operators never
//! fail; ordering operators fail loudly on anything that is not a decimal
//! number instead of quietly answering `false`.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sextant_core::ValueObject;

use crate::operator::RuleOperator;

/// Which side of a comparison an operand came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandSide {
    /// The candidate's property value.
    Actual,
    /// The rule's configured operator value.
    Operator,
}

impl core::fmt::Display for OperandSide {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OperandSide::Actual => f.write_str("actual"),
            OperandSide::Operator => f.write_str("operator"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleEvaluationError {
    #[error("invalid operand: {side} value {value:?} is not a number")]
    InvalidOperand {
        side: OperandSide,
        value: Option<String>,
    },

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
}

/// Evaluate `actual <operator> operand`.
///
/// - `Equals` / `NotEquals`: exact, case-sensitive comparison; two nulls are equal.
/// - `Contains`: substring test; `false` when either side is null.
/// - ordering operators: both sides parsed as exact decimals (surrounding
///   whitespace ignored), otherwise [`RuleEvaluationError::InvalidOperand`].
pub fn evaluate(
    operator: RuleOperator,
    actual: Option<&str>,
    operand: Option<&str>,
) -> Result<bool, RuleEvaluationError> {
    match operator {
        RuleOperator::Equals => Ok(actual == operand),
        RuleOperator::NotEquals => Ok(actual != operand),
        RuleOperator::Contains => Ok(match (actual, operand) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        }),
        RuleOperator::GreaterThan => compare(actual, operand, |a, b| a > b),
        RuleOperator::GreaterThanOrEqual => compare(actual, operand, |a, b| a >= b),
        RuleOperator::LessThan => compare(actual, operand, |a, b| a < b),
        RuleOperator::LessThanOrEqual => compare(actual, operand, |a, b| a <= b),
    }
}

fn compare(
    actual: Option<&str>,
    operand: Option<&str>,
    cmp: impl FnOnce(Decimal, Decimal) -> bool,
) -> Result<bool, RuleEvaluationError> {
    let a = parse_number(OperandSide::Actual, actual)?;
    let b = parse_number(OperandSide::Operator, operand)?;
    Ok(cmp(a, b))
}

/// Parse plain decimal notation: optional sign, digits, optional fraction.
/// Exponents, hex, `NaN`, infinities and values outside `Decimal`'s range
/// are invalid.
fn parse_number(side: OperandSide, raw: Option<&str>) -> Result<Decimal, RuleEvaluationError> {
    let invalid = || RuleEvaluationError::InvalidOperand {
        side,
        value: raw.map(str::to_string),
    };

    let text = raw.ok_or_else(invalid)?.trim();
    let text = text.strip_prefix('+').unwrap_or(text);
    if !is_decimal_literal(text) {
        return Err(invalid());
    }
    Decimal::from_str(text).map_err(|_| invalid())
}

fn is_decimal_literal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    digits(whole) && fraction.is_none_or(digits)
}

/// A single predicate on one property of a candidate resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequirementRule {
    #[serde(default)]
    pub property_name: String,
    pub operator: RuleOperator,
    #[serde(default)]
    pub operator_value: Option<String>,
}

impl ValueObject for DataRequirementRule {}

impl DataRequirementRule {
    pub fn new(
        property_name: impl Into<String>,
        operator: RuleOperator,
        operator_value: Option<impl Into<String>>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            operator,
            operator_value: operator_value.map(Into::into),
        }
    }

    /// Evaluate this rule against a candidate. A missing property is null.
    pub fn evaluate_against(&self, candidate: &Candidate) -> Result<bool, RuleEvaluationError> {
        evaluate(
            self.operator,
            candidate.property(&self.property_name),
            self.operator_value.as_deref(),
        )
    }
}

/// A resource offered for matching: its type and flattened property values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub resource_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Option<String>>,
}

impl Candidate {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.properties.insert(name.into(), value.map(Into::into));
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_is_exact_and_case_sensitive() {
        assert!(evaluate(RuleOperator::Equals, Some("final"), Some("final")).unwrap());
        assert!(!evaluate(RuleOperator::Equals, Some("Final"), Some("final")).unwrap());
        assert!(evaluate(RuleOperator::Equals, None, None).unwrap());
        assert!(!evaluate(RuleOperator::Equals, Some("x"), None).unwrap());
        assert!(evaluate(RuleOperator::NotEquals, None, Some("x")).unwrap());
    }

    #[test]
    fn contains_matches_substrings() {
        assert!(evaluate(RuleOperator::Contains, Some("hello world"), Some("wor")).unwrap());
        assert!(!evaluate(RuleOperator::Contains, Some("hello"), Some("xyz")).unwrap());
        assert!(evaluate(RuleOperator::Contains, Some("hello"), Some("")).unwrap());
    }

    #[test]
    fn contains_with_a_null_side_is_false() {
        assert!(!evaluate(RuleOperator::Contains, None, Some("a")).unwrap());
        assert!(!evaluate(RuleOperator::Contains, Some("abc"), None).unwrap());
        assert!(!evaluate(RuleOperator::Contains, None, None).unwrap());
    }

    #[test]
    fn numeric_comparisons() {
        assert!(evaluate(RuleOperator::GreaterThan, Some("130"), Some("126")).unwrap());
        assert!(!evaluate(RuleOperator::GreaterThan, Some("126"), Some("126")).unwrap());
        assert!(evaluate(RuleOperator::GreaterThanOrEqual, Some("126"), Some("126.0")).unwrap());
        assert!(evaluate(RuleOperator::LessThan, Some("-1.5"), Some("0")).unwrap());
        assert!(evaluate(RuleOperator::LessThanOrEqual, Some(" 7 "), Some("7")).unwrap());
    }

    #[test]
    fn comparisons_are_exact_beyond_binary_float_precision() {
        // 2^53 + 1 and 2^53 collapse to the same f64.
        assert!(evaluate(RuleOperator::GreaterThan, Some("9007199254740993"), Some("9007199254740992")).unwrap());
        assert!(evaluate(RuleOperator::GreaterThan, Some("0.30000000000000001"), Some("0.3")).unwrap());
        assert!(!evaluate(RuleOperator::LessThanOrEqual, Some("0.30000000000000001"), Some("0.3")).unwrap());
        assert!(evaluate(RuleOperator::GreaterThanOrEqual, Some("+126"), Some("126.000")).unwrap());
    }

    #[test]
    fn non_decimal_syntax_is_rejected() {
        for raw in ["1e5", "1E-3", "0x10", "1_000", ".5", "5.", "--1", "1.2.3", "", " "] {
            assert!(
                evaluate(RuleOperator::GreaterThan, Some(raw), Some("0")).is_err(),
                "{raw:?} should not parse"
            );
        }
        // Too many digits for an exact decimal.
        let huge = "9".repeat(40);
        assert!(evaluate(RuleOperator::LessThan, Some(huge.as_str()), Some("1")).is_err());
    }

    #[test]
    fn non_numeric_actual_is_an_invalid_operand() {
        let err = evaluate(RuleOperator::GreaterThan, Some("abc"), Some("1")).unwrap_err();
        assert_eq!(
            err,
            RuleEvaluationError::InvalidOperand {
                side: OperandSide::Actual,
                value: Some("abc".to_string()),
            }
        );
    }

    #[test]
    fn null_or_non_finite_operands_are_invalid() {
        let err = evaluate(RuleOperator::LessThan, Some("1"), None).unwrap_err();
        assert!(matches!(
            err,
            RuleEvaluationError::InvalidOperand { side: OperandSide::Operator, value: None }
        ));

        assert!(evaluate(RuleOperator::LessThan, None, Some("1")).is_err());
        assert!(evaluate(RuleOperator::GreaterThan, Some("NaN"), Some("1")).is_err());
        assert!(evaluate(RuleOperator::GreaterThan, Some("inf"), Some("1")).is_err());
    }

    #[test]
    fn rule_reads_candidate_properties() {
        let rule = DataRequirementRule::new("value", RuleOperator::GreaterThan, Some("126"));
        let high = Candidate::new("Observation").with_property("value", Some("140"));
        let low = Candidate::new("Observation").with_property("value", Some("99"));
        assert!(rule.evaluate_against(&high).unwrap());
        assert!(!rule.evaluate_against(&low).unwrap());

        // Missing property is null, which is not a number.
        let missing = Candidate::new("Observation");
        assert!(rule.evaluate_against(&missing).is_err());
    }

    #[test]
    fn rule_json_shape() {
        let rule: DataRequirementRule = serde_json::from_str(
            r#"{"propertyName":"value","operator":"greaterthan","operatorValue":"126"}"#,
        )
        .unwrap();
        assert_eq!(rule.operator, RuleOperator::GreaterThan);

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["operator"], "GreaterThan");
        assert_eq!(json["operatorValue"], "126");

        let bare: DataRequirementRule =
            serde_json::from_str(r#"{"propertyName":"status","operator":"Equals"}"#).unwrap();
        assert_eq!(bare.operator_value, None);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn numeric_text() -> impl Strategy<Value = String> {
            prop_oneof![
                any::<i64>().prop_map(|n| n.to_string()),
                (any::<i32>(), 0u32..10_000).prop_map(|(whole, frac)| format!("{whole}.{frac:04}")),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: NotEquals is the exact negation of Equals.
            #[test]
            fn not_equals_negates_equals(
                a in proptest::option::of(".{0,12}"),
                b in proptest::option::of(".{0,12}"),
            ) {
                let eq = evaluate(RuleOperator::Equals, a.as_deref(), b.as_deref()).unwrap();
                let ne = evaluate(RuleOperator::NotEquals, a.as_deref(), b.as_deref()).unwrap();
                prop_assert_eq!(ne, !eq);
            }

            /// Property: for numbers, GreaterThan is the negation of LessThanOrEqual.
            #[test]
            fn greater_than_negates_less_than_or_equal(a in numeric_text(), b in numeric_text()) {
                let gt = evaluate(RuleOperator::GreaterThan, Some(&a), Some(&b)).unwrap();
                let lte = evaluate(RuleOperator::LessThanOrEqual, Some(&a), Some(&b)).unwrap();
                prop_assert_eq!(gt, !lte);

                let gte = evaluate(RuleOperator::GreaterThanOrEqual, Some(&a), Some(&b)).unwrap();
                let lt = evaluate(RuleOperator::LessThan, Some(&a), Some(&b)).unwrap();
                prop_assert_eq!(gte, !lt);
            }

            /// Property: string operators are total (never fail).
            #[test]
            fn string_operators_never_fail(
                a in proptest::option::of(".{0,12}"),
                b in proptest::option::of(".{0,12}"),
            ) {
                for op in [RuleOperator::Equals, RuleOperator::NotEquals, RuleOperator::Contains] {
                    prop_assert!(evaluate(op, a.as_deref(), b.as_deref()).is_ok());
                }
            }

            /// Property: any text with a letter in it is rejected by ordering operators.
            #[test]
            fn alphabetic_operands_are_rejected(word in "[g-z]{1,8}", n in numeric_text()) {
                let err = evaluate(RuleOperator::GreaterThan, Some(&word), Some(&n)).unwrap_err();
                let is_invalid_actual = matches!(
                    err,
                    RuleEvaluationError::InvalidOperand { side: OperandSide::Actual, .. }
                );
                prop_assert!(is_invalid_actual);
            }

            /// Property: a string always contains each of its substrings.
            #[test]
            fn contains_every_substring(s in "[a-z ]{0,24}", start in 0usize..24, len in 0usize..24) {
                let start = start.min(s.len());
                let end = (start + len).min(s.len());
                let needle = &s[start..end];
                prop_assert!(evaluate(RuleOperator::Contains, Some(&s), Some(needle)).unwrap());
            }
        }
    }
}
