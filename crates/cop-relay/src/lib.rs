//! # COP Relay
//!
//! Visibility-filtered access to TDF objects, and live fan-out of new
//! objects to connected stream clients.
//!
//! ## Overview
//!
//! The relay sits between a relational store and many callers:
//!
//! - **Queries**: objects matching a source type, time range, search
//!   containment or bounding box, filtered to what the caller may see
//! - **Streams**: every insert the store announces is pushed to every
//!   connected client, along with CONNECTED, HEARTBEAT and SHUTDOWN events
//! - **Entitlements**: bearer tokens resolve to entitlement labels through
//!   the authorization platform, cached per token
//!
//! ## Key Concepts
//!
//! - **Visibility**: classification and need-to-know are all-of,
//!   releasable-to is any-of, and search attributes never leave the relay
//! - **Best-effort delivery**: a client that connects late misses what was
//!   already broadcast; a slow or broken client never blocks the others
//! - **Self-healing listener**: lost store connections are retried with
//!   capped exponential backoff until shutdown
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cop_relay::{Relay, RelayConfig};
//! use cop_relay::core::StreamKind;
//! use cop_relay::store::MemoryObjectStore;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = RelayConfig::from_file("relay.toml")?;
//!     cop_relay::logging::init(&config.log)?;
//!
//!     let relay = Relay::start(
//!         &config,
//!         config.postgres_feed()?,
//!         MemoryObjectStore::new(),
//!         config.http_resolver()?,
//!     )
//!     .await?;
//!
//!     // Per client connection:
//!     let service = relay.service();
//!     let (sink, mut events) = service.channel_sink(StreamKind::Objects);
//!     let cancel = CancellationToken::new();
//!     tokio::spawn(async move {
//!         service.stream("Bearer token", sink, cancel).await
//!     });
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event.event_type.as_str());
//!     }
//!
//!     relay.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `cop_relay::core` - Data model (TdfObject, Geometry, StreamEvent, etc.)
//! - `cop_relay::perms` - Visibility policy and entitlement cache
//! - `cop_relay::store` - Notification feed and object store seams
//! - `cop_relay::stream` - Listener, registry and sessions

pub mod config;
pub mod error;
pub mod logging;
pub mod relay;
pub mod service;

// Re-export component crates
pub use cop_relay_core as core;
pub use cop_relay_perms as perms;
pub use cop_relay_store as store;
pub use cop_relay_stream as stream;

// Re-export main types for convenience
pub use config::{LogConfig, LogFormat, LogLevel, RelayConfig};
pub use error::{RelayError, Result};
pub use relay::Relay;
pub use service::{normalize_token, ObjectService};

// Re-export commonly used component types
pub use cop_relay_core::{
    ChangeEvent, EntitlementSet, Geometry, ObjectId, StreamEvent, StreamEventType, StreamKind,
    TdfNote, TdfObject,
};
pub use cop_relay_store::ObjectQuery;
pub use cop_relay_stream::{ListenerState, SessionReport};
