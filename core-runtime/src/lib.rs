//! # Core Runtime Module
//!
//! Composition and observability glue for the offline core: configuration
//! with fail-fast validation, the broadcast [`EventBus`](events::EventBus),
//! and `tracing` initialization.
//!
//! Services are constructed explicitly from a validated [`CoreConfig`]
//! (config::CoreConfig); there are no module-level singletons and no implicit
//! defaults for required collaborators.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, MigrationEvent, NetworkEvent, SyncEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
