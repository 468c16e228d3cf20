//! Infrastructure layer: persistence adapters and application services.
//!
//! - `repository`: storage traits plus in-memory implementations (dev/test).
//! - `postgres`: PostgreSQL implementations of the same traits.
//! - `services`: use-case orchestration over any repository.

pub mod postgres;
pub mod repository;
pub mod services;
pub mod store;

pub use store::StoreError;
