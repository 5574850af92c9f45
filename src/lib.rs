//! Postgres persistence backend for event-sourced actors.
//!
//! Events and snapshots are stored as self-describing JSON envelopes, keyed by
//! actor name and per-actor sequence number. Payload types are registered once
//! at startup:
//!
//! ```no_run
//! use actor_persistence_pg::config::ProviderConfig;
//! use actor_persistence_pg::domain::user;
//! use actor_persistence_pg::event_sourcing::{registry, PostgresProvider, TypeRegistry};
//!
//! # async fn run() -> anyhow::Result<()> {
//! registry::init_global(user::register_types(TypeRegistry::builder()).build())?;
//!
//! let config = ProviderConfig::from_env();
//! let provider = PostgresProvider::builder(config.connect().await?)
//!     .config(&config)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
