//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity; two instances with the same attribute
/// values are the same value. To "modify" one, build a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Rule { property_name: String, operator: RuleOperator, operator_value: Option<String> }
///
/// impl ValueObject for Rule {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
