//! Persistence contracts for the allocation service.
//!
//! - [`Repository`]: collection-like access to [`domain::Product`] aggregates,
//!   tracking every aggregate it hands out so their events can be collected
//! - [`UnitOfWork`]: a transaction owning one repository
//! - [`InMemoryStore`], [`InMemoryRepository`], [`InMemoryUnitOfWork`]: the
//!   in-process implementation used by the service and the tests

pub mod error;
pub mod repository;
pub mod store;
pub mod unit_of_work;

pub use error::{PersistenceError, Result};
pub use repository::{InMemoryRepository, Repository};
pub use store::InMemoryStore;
pub use unit_of_work::{InMemoryUnitOfWork, UnitOfWork};
