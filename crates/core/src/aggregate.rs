//! Aggregate root trait.

/// Aggregate root marker + minimal interface.
///
/// An aggregate is the unit of consistency: it is loaded, validated and
/// persisted as a whole, and the children it owns have no lifecycle of their
/// own outside of it.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Check every invariant the aggregate owns, children included.
    fn validate(&self) -> crate::DomainResult<()>;
}
