//! # ecclesia-store
//!
//! Every Ecclesia record is a JSON document in a named collection. The
//! [`DocumentStore`] trait abstracts the backend; [`Repository`] adds typed
//! access for anything implementing [`Document`].
//!
//! Two backends ship with the crate:
//! - [`MemoryStore`] keeps collections in process memory (tests, local runs)
//! - [`PostgresStore`] keeps every collection in one `documents` table with a
//!   `jsonb` payload

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use document::{Document, Repository};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::{PostgresStore, PostgresStoreConfig};
pub use query::{compare_values, Direction, OrderBy, Query};
pub use store::DocumentStore;
