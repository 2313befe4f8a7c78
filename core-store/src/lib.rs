//! # Local Store Module
//!
//! Owns the embedded, client-resident persistence layer and provides the
//! backend-agnostic [`LocalStore`] contract the rest of the core is written
//! against.
//!
//! ## Overview
//!
//! Two interchangeable backends satisfy the contract:
//!
//! - [`DocumentStore`](document::DocumentStore) - one JSON document file per
//!   collection, cheap writes, no cross-collection transactions
//! - [`SqliteStore`](relational::SqliteStore) - SQLite via sqlx with typed
//!   columns, tenant indexes and conflict-clause upserts
//!
//! The backend is selected exactly once at composition time through
//! [`open_store`]; call sites never branch on the engine. Initialization
//! failure propagates to the caller, there is no fallback to the other
//! backend.

pub mod db;
pub mod document;
pub mod error;
pub mod models;
pub mod relational;
pub mod store;

pub use db::{create_pool, create_test_pool, DatabaseConfig, DatabaseLocation};
pub use document::DocumentStore;
pub use error::{Result, StoreError};
pub use models::{Collection, Customer, Product, Sale, SaleItem, SchoolClass, Student};
pub use relational::SqliteStore;
pub use store::{open_store, record_key, LocalStore, StoreBackend};
