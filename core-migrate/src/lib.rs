//! # Store Migration Module
//!
//! One-shot, idempotent transfer of every collection from a legacy store
//! engine into a new one, run before normal operation when the configured
//! backend changes.
//!
//! The completion marker lives in the
//! [`FlagStore`](bridge_traits::FlagStore), outside both engines, so a
//! finished migration is never re-triggered, no matter which engine the
//! process boots with afterwards. Transfers go through plain upserts, which
//! makes a re-run (after a crash mid-migration) safe.

pub mod error;
pub mod migrator;

pub use error::{MigrateError, Result};
pub use migrator::{CollectionFailure, MigrationReport, StoreMigrator, MIGRATION_COMPLETE_FLAG};
