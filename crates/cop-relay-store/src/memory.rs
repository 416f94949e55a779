//! In-memory implementations of the store traits.
//!
//! These are primarily for testing. [`MemoryFeed`] behaves like a
//! Postgres LISTEN connection that tests can publish into and break on
//! demand; [`MemoryObjectStore`] answers the same queries the SQL store
//! does, with JSON containment and bounding-box intersection standing in
//! for the database operators.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

use cop_relay_core::{ObjectId, TdfObject};

use crate::error::{Result, StoreError};
use crate::traits::{Notification, NotificationFeed, ObjectQuery, ObjectStore, Subscription};

const SUBSCRIPTION_BUFFER: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// Notification feed
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory notification feed.
pub struct MemoryFeed {
    inner: RwLock<MemoryFeedInner>,
    subscribed: Notify,
}

#[derive(Default)]
struct MemoryFeedInner {
    subscribers: HashMap<String, Vec<mpsc::Sender<Result<Notification>>>>,
    subscribe_attempts: usize,
    failing_subscribes: usize,
    unreachable: bool,
}

impl MemoryFeed {
    /// Create a new feed. Returned in an `Arc` so tests can keep a handle
    /// while the listener owns another.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(MemoryFeedInner::default()),
            subscribed: Notify::new(),
        })
    }

    /// Deliver `payload` to every live subscription on `channel`.
    ///
    /// Returns how many subscriptions received it.
    pub async fn publish(&self, channel: &str, payload: impl Into<String>) -> usize {
        let notification = Notification {
            channel: channel.to_string(),
            payload: payload.into(),
        };

        let senders = self.live_senders(channel);
        let mut delivered = 0;
        for sender in senders {
            if sender.send(Ok(notification.clone())).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Break every subscription on `channel` with an error.
    pub async fn fail_connections(&self, channel: &str, reason: &str) {
        let senders = self.write().subscribers.remove(channel).unwrap_or_default();
        for sender in senders {
            let _ = sender
                .send(Err(StoreError::ConnectionClosed(reason.to_string())))
                .await;
        }
    }

    /// Close every subscription on `channel` without an error.
    pub fn close_connections(&self, channel: &str) {
        self.write().subscribers.remove(channel);
    }

    /// Make the next `n` subscribe calls fail.
    pub fn fail_next_subscribes(&self, n: usize) {
        self.write().failing_subscribes = n;
    }

    /// Make `ping` fail (or succeed again).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.write().unreachable = unreachable;
    }

    /// Number of subscribe calls seen so far, failed ones included.
    pub fn subscribe_attempts(&self) -> usize {
        self.read().subscribe_attempts
    }

    /// Number of open subscriptions on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.read()
            .subscribers
            .get(channel)
            .map(|senders| senders.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }

    /// Wait until at least `n` subscriptions are open on `channel`.
    pub async fn wait_for_subscribers(&self, channel: &str, n: usize) {
        loop {
            let notified = self.subscribed.notified();
            if self.subscriber_count(channel) >= n {
                return;
            }
            notified.await;
        }
    }

    fn live_senders(&self, channel: &str) -> Vec<mpsc::Sender<Result<Notification>>> {
        let mut inner = self.write();
        match inner.subscribers.get_mut(channel) {
            Some(senders) => {
                senders.retain(|s| !s.is_closed());
                senders.clone()
            }
            None => Vec::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryFeedInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryFeedInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NotificationFeed for MemoryFeed {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>> {
        let receiver = {
            let mut inner = self.write();
            inner.subscribe_attempts += 1;

            if inner.failing_subscribes > 0 {
                inner.failing_subscribes -= 1;
                return Err(StoreError::ConnectionClosed("refused".into()));
            }

            let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
            inner
                .subscribers
                .entry(channel.to_string())
                .or_default()
                .push(tx);
            rx
        };

        self.subscribed.notify_waiters();
        Ok(Box::new(MemorySubscription { receiver }))
    }

    async fn ping(&self) -> Result<()> {
        if self.read().unreachable {
            return Err(StoreError::ConnectionClosed("unreachable".into()));
        }
        Ok(())
    }
}

struct MemorySubscription {
    receiver: mpsc::Receiver<Result<Notification>>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_notification(&mut self) -> Option<Result<Notification>> {
        self.receiver.recv().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object store
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory object store.
///
/// All data is lost when the store is dropped.
#[derive(Default)]
pub struct MemoryObjectStore {
    inner: RwLock<HashMap<ObjectId, TdfObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object. Returns false if the id already exists.
    pub fn insert(&self, object: TdfObject) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.contains_key(&object.id) {
            return false;
        }
        inner.insert(object.id, object);
        true
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ObjectId, TdfObject>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, id: &ObjectId) -> Result<Option<TdfObject>> {
        Ok(self.read().get(id).cloned())
    }

    async fn query_objects(&self, query: &ObjectQuery) -> Result<Vec<TdfObject>> {
        let end = query.end.unwrap_or_else(|| Utc::now().naive_utc());
        if end < query.start {
            return Err(StoreError::InvalidQuery("end precedes start".into()));
        }

        let area = match &query.within {
            Some(geometry) => Some(geometry.bbox().ok_or_else(|| {
                StoreError::InvalidQuery("query geometry has no coordinates".into())
            })?),
            None => None,
        };

        let mut matches: Vec<TdfObject> = self
            .read()
            .values()
            .filter(|o| o.source_type == query.source_type)
            .filter(|o| o.ts >= query.start && o.ts <= end)
            .filter(|o| match &query.search {
                Some(needle) => search_contains(o.search.as_deref(), needle),
                None => true,
            })
            .filter(|o| match &area {
                Some(area) => o
                    .geometry
                    .as_ref()
                    .and_then(|g| g.bbox())
                    .is_some_and(|b| b.intersects(area)),
                None => true,
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.ts.cmp(&a.ts).then_with(|| a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn list_source_types(&self) -> Result<Vec<String>> {
        let types: BTreeSet<String> = self.read().values().map(|o| o.source_type.clone()).collect();
        Ok(types.into_iter().collect())
    }
}

fn search_contains(search: Option<&[u8]>, needle: &Value) -> bool {
    let Some(bytes) = search else {
        return false;
    };
    match serde_json::from_slice::<Value>(bytes) {
        Ok(haystack) => json_contains(&haystack, needle),
        Err(_) => false,
    }
}

/// JSON containment with the semantics of Postgres `@>`.
pub(crate) fn json_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(h), Value::Object(n)) => n
            .iter()
            .all(|(k, nv)| h.get(k).is_some_and(|hv| json_contains(hv, nv))),
        (Value::Array(h), Value::Array(n)) => n
            .iter()
            .all(|nv| h.iter().any(|hv| json_contains(hv, nv))),
        // A top-level array contains a bare scalar it holds.
        (Value::Array(h), n) if !n.is_object() && !n.is_array() => h.iter().any(|hv| hv == n),
        (h, n) => h == n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use cop_relay_core::Geometry;
    use serde_json::json;

    const CHANNEL: &str = "tdf_objects_inserted";

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn object(source_type: &str, ts: NaiveDateTime, search: Option<Value>) -> TdfObject {
        TdfObject {
            id: ObjectId::random(),
            ts,
            source_type: source_type.to_string(),
            geometry: None,
            search: search.map(|v| Bytes::from(v.to_string())),
            content: Bytes::from_static(b"blob"),
            uri: None,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let feed = MemoryFeed::new();
        let mut a = feed.subscribe(CHANNEL).await.unwrap();
        let mut b = feed.subscribe(CHANNEL).await.unwrap();

        assert_eq!(feed.publish(CHANNEL, "hello").await, 2);
        assert_eq!(feed.publish("other", "ignored").await, 0);

        let got = a.next_notification().await.unwrap().unwrap();
        assert_eq!(got.payload, "hello");
        assert_eq!(got.channel, CHANNEL);
        assert_eq!(b.next_notification().await.unwrap().unwrap().payload, "hello");
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let feed = MemoryFeed::new();
        let sub = feed.subscribe(CHANNEL).await.unwrap();
        assert_eq!(feed.subscriber_count(CHANNEL), 1);

        drop(sub);
        assert_eq!(feed.subscriber_count(CHANNEL), 0);
        assert_eq!(feed.publish(CHANNEL, "x").await, 0);
    }

    #[tokio::test]
    async fn test_fail_and_close_connections() {
        let feed = MemoryFeed::new();
        let mut sub = feed.subscribe(CHANNEL).await.unwrap();
        feed.fail_connections(CHANNEL, "reset").await;
        assert!(matches!(
            sub.next_notification().await,
            Some(Err(StoreError::ConnectionClosed(_)))
        ));
        assert!(sub.next_notification().await.is_none());

        let mut sub = feed.subscribe(CHANNEL).await.unwrap();
        feed.close_connections(CHANNEL);
        assert!(sub.next_notification().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_subscribes_and_ping() {
        let feed = MemoryFeed::new();
        feed.fail_next_subscribes(2);

        assert!(feed.subscribe(CHANNEL).await.is_err());
        assert!(feed.subscribe(CHANNEL).await.is_err());
        assert!(feed.subscribe(CHANNEL).await.is_ok());
        assert_eq!(feed.subscribe_attempts(), 3);

        feed.ping().await.unwrap();
        feed.set_unreachable(true);
        assert!(feed.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_wait_for_subscribers() {
        let feed = MemoryFeed::new();
        let waiter = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.wait_for_subscribers(CHANNEL, 1).await })
        };

        let _sub = feed.subscribe(CHANNEL).await.unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_filters_by_type_and_range() {
        let store = MemoryObjectStore::new();
        store.insert(object("radar", at(1), None));
        store.insert(object("radar", at(5), None));
        store.insert(object("radar", at(9), None));
        store.insert(object("sonar", at(5), None));

        let query = ObjectQuery::new("radar", at(2)).until(at(9));
        let found = store.query_objects(&query).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].ts, at(9));
        assert_eq!(found[1].ts, at(5));
    }

    #[tokio::test]
    async fn test_query_end_defaults_to_now() {
        let store = MemoryObjectStore::new();
        let now = Utc::now().naive_utc();
        store.insert(object("radar", now - Duration::hours(1), None));
        store.insert(object("radar", now + Duration::hours(1), None));

        let query = ObjectQuery::new("radar", now - Duration::days(1));
        assert_eq!(store.query_objects(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_query_search_containment() {
        let store = MemoryObjectStore::new();
        store.insert(object(
            "radar",
            at(1),
            Some(json!({"attrClassification": ["secret"], "callsign": "alpha"})),
        ));
        store.insert(object("radar", at(2), Some(json!({"callsign": "bravo"}))));
        store.insert(object("radar", at(3), None));

        let query = ObjectQuery::new("radar", at(0))
            .until(at(10))
            .matching(json!({"callsign": "alpha"}));
        let found = store.query_objects(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ts, at(1));
    }

    #[tokio::test]
    async fn test_query_geometry_intersection() {
        let store = MemoryObjectStore::new();
        let mut inside = object("radar", at(1), None);
        inside.geometry = Some(Geometry::from_geojson(r#"{"type":"Point","coordinates":[1.0,1.0]}"#).unwrap());
        let mut outside = object("radar", at(2), None);
        outside.geometry =
            Some(Geometry::from_geojson(r#"{"type":"Point","coordinates":[50.0,50.0]}"#).unwrap());
        store.insert(inside.clone());
        store.insert(outside);
        store.insert(object("radar", at(3), None));

        let area = Geometry::from_geojson(
            r#"{"type":"Polygon","coordinates":[[[0,0],[2,0],[2,2],[0,2],[0,0]]]}"#,
        )
        .unwrap();
        let query = ObjectQuery::new("radar", at(0)).until(at(10)).within(area);
        let found = store.query_objects(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, inside.id);
    }

    #[tokio::test]
    async fn test_query_inverted_range_rejected() {
        let store = MemoryObjectStore::new();
        let query = ObjectQuery::new("radar", at(5)).until(at(1));
        assert!(matches!(
            store.query_objects(&query).await,
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_get_and_list() {
        let store = MemoryObjectStore::new();
        let obj = object("sonar", at(1), None);
        assert!(store.insert(obj.clone()));
        assert!(!store.insert(obj.clone()));
        store.insert(object("radar", at(1), None));
        store.insert(object("radar", at(2), None));

        assert_eq!(store.get_object(&obj.id).await.unwrap(), Some(obj));
        assert_eq!(store.get_object(&ObjectId::random()).await.unwrap(), None);
        assert_eq!(
            store.list_source_types().await.unwrap(),
            vec!["radar".to_string(), "sonar".to_string()]
        );
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_json_contains() {
        let doc = json!({"a": 1, "tags": ["x", "y"], "nested": {"b": true, "c": 2}});
        assert!(json_contains(&doc, &json!({})));
        assert!(json_contains(&doc, &json!({"a": 1})));
        assert!(json_contains(&doc, &json!({"tags": ["y"]})));
        assert!(json_contains(&doc, &json!({"nested": {"b": true}})));
        assert!(!json_contains(&doc, &json!({"a": 2})));
        assert!(!json_contains(&doc, &json!({"tags": ["z"]})));
        assert!(!json_contains(&doc, &json!({"missing": null})));
        assert!(json_contains(&json!(["x", "y"]), &json!("x")));
    }
}
