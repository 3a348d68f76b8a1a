//! `taskboard-store` — the persistence boundary.
//!
//! Defines the [`Store`]/[`StoreTxn`] contracts the mutation orchestrator is
//! written against, plus two implementations: an in-memory store (tests/dev)
//! and a Postgres store (production, via sqlx).

pub mod error;
pub mod filter;
pub mod memory;
pub mod page;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use filter::{ActivityFilter, TaskFilter};
pub use memory::MemoryStore;
pub use page::{Page, PageMeta, PageRequest};
pub use postgres::PostgresStore;
pub use store::{Store, StoreTxn};
