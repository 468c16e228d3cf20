//! `sextant-core`: domain foundation building blocks.
//!
//! Pure domain primitives shared by every bounded context: identifiers,
//! the domain error model, entity/aggregate markers and paging.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod pagination;
pub mod value_object;

pub use aggregate::AggregateRoot;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{DataRequirementId, ProfileId, RoleId, UserId};
pub use pagination::PageRequest;
pub use value_object::ValueObject;
