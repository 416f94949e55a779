//! # COP Relay Store
//!
//! Store abstraction for the COP relay: change notifications and object
//! reads.
//!
//! ## Overview
//!
//! The relational store is the source of truth. Inserting a row fires a
//! trigger that publishes the row as JSON on a notification channel. The
//! relay consumes that feed through [`NotificationFeed`] and serves
//! historical reads through [`ObjectStore`]. [`PostgresFeed`] is the
//! production feed; the `memory` module has in-memory versions of both
//! traits for tests.
//!
//! ## Key Types
//!
//! - [`NotificationFeed`] - Opens subscriptions on a channel
//! - [`Subscription`] - One live subscription
//! - [`ObjectStore`] - Point and range reads over objects
//! - [`ObjectQuery`] - Range query parameters
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cop_relay_store::{NotificationFeed, PostgresFeed};
//!
//! async fn example() {
//!     let feed = PostgresFeed::new("postgres://relay@localhost/cop").unwrap();
//!     feed.ping().await.unwrap();
//!
//!     let mut sub = feed.subscribe("tdf_objects_inserted").await.unwrap();
//!     while let Some(Ok(n)) = sub.next_notification().await {
//!         println!("{}", n.payload);
//!     }
//! }
//! ```

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryFeed, MemoryObjectStore};
pub use postgres::{PostgresFeed, PostgresSubscription};
pub use traits::{Notification, NotificationFeed, ObjectQuery, ObjectStore, Subscription};
