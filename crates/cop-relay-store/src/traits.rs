//! Store traits: the interface boundary to the relational store.
//!
//! The relay needs two things from the store: a feed of insert
//! notifications to fan out, and read access to objects for the query
//! path. Both are traits so the relay can run against Postgres in
//! production and in-memory implementations in tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use cop_relay_core::{Geometry, ObjectId, TdfObject};

use crate::error::Result;

/// A notification received on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: String,
    pub payload: String,
}

/// Source of change notifications.
#[async_trait]
pub trait NotificationFeed: Send + Sync {
    /// Open a dedicated connection and start listening on `channel`.
    ///
    /// Returns once the store has acknowledged the subscription.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>>;

    /// Check that the store can be reached at all.
    async fn ping(&self) -> Result<()>;
}

/// A live subscription on one channel.
///
/// Dropping the subscription releases its connection.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next notification.
    ///
    /// `Some(Err(_))` reports a connection failure; `None` means the
    /// connection closed. Either way the subscription is finished and
    /// must be re-established.
    async fn next_notification(&mut self) -> Option<Result<Notification>>;
}

#[async_trait]
impl<F: NotificationFeed + ?Sized> NotificationFeed for Arc<F> {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>> {
        (**self).subscribe(channel).await
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }
}

/// Parameters for a range query over objects of one source type.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectQuery {
    pub source_type: String,
    /// Inclusive lower bound on `ts`.
    pub start: NaiveDateTime,
    /// Inclusive upper bound on `ts`; `None` means "now".
    pub end: Option<NaiveDateTime>,
    /// JSON document the object's search attributes must contain.
    pub search: Option<serde_json::Value>,
    /// Geometry the object's geometry must intersect.
    pub within: Option<Geometry>,
}

impl ObjectQuery {
    pub fn new(source_type: impl Into<String>, start: NaiveDateTime) -> Self {
        Self {
            source_type: source_type.into(),
            start,
            end: None,
            search: None,
            within: None,
        }
    }

    pub fn until(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn matching(mut self, search: serde_json::Value) -> Self {
        self.search = Some(search);
        self
    }

    pub fn within(mut self, geometry: Geometry) -> Self {
        self.within = Some(geometry);
        self
    }
}

/// Read access to stored objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get one object by id.
    async fn get_object(&self, id: &ObjectId) -> Result<Option<TdfObject>>;

    /// Objects matching `query`, newest first.
    async fn query_objects(&self, query: &ObjectQuery) -> Result<Vec<TdfObject>>;

    /// Every known source type, sorted.
    async fn list_source_types(&self) -> Result<Vec<String>>;
}
