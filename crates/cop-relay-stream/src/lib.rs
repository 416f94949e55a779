//! # COP Relay Stream
//!
//! Live fan-out of new objects to connected clients.
//!
//! ## Overview
//!
//! The [`Listener`] holds a subscription on the store's insert channel,
//! parses each notification and hands it to the [`Registry`], which sends
//! it to every connected client. Each client connection is a [`Session`]
//! that registers on open, sends CONNECTED and periodic heartbeats, and
//! deregisters when its cancellation token fires.
//!
//! ## Key Properties
//!
//! - **Best-effort**: delivery is at-most-once, with no replay for late joiners
//! - **Resilient**: a malformed notification is dropped, never fatal
//! - **Self-healing**: lost connections are retried with backoff until shutdown
//! - **Isolated**: one failing client never blocks the others
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cop_relay_stream::{ChannelSink, Listener, ListenerConfig, Registry, Session, SessionConfig};
//! use cop_relay_store::PostgresFeed;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example() {
//!     let registry = Arc::new(Registry::new());
//!     let feed = PostgresFeed::new("postgres://relay@localhost/cop").unwrap();
//!     let shutdown = CancellationToken::new();
//!
//!     let listener = Listener::new(feed, Arc::clone(&registry), ListenerConfig::default()).unwrap();
//!     tokio::spawn(listener.run(shutdown.child_token()));
//!
//!     // Per client connection:
//!     let (sink, mut events) = ChannelSink::objects(64);
//!     let session =
//!         Session::open(Arc::clone(&registry), Arc::new(sink), None, SessionConfig::default())
//!             .unwrap();
//!     tokio::spawn(session.run(shutdown.child_token()));
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event.event_type.as_str());
//!     }
//! }
//! ```

pub mod error;
pub mod listener;
pub mod registry;
pub mod session;
pub mod sink;

pub use error::{Result, SendError, StreamError};
pub use listener::{Listener, ListenerConfig, ListenerState, ListenerStats, DEFAULT_CHANNEL};
pub use registry::{BroadcastReport, ClientId, Registry};
pub use session::{Session, SessionConfig, SessionEnd, SessionReport};
pub use sink::{ChannelSink, EventSink};
