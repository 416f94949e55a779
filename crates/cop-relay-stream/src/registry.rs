//! Client registry and broadcaster.
//!
//! The registry owns the process-wide list of connected clients. All
//! access goes through its methods; the list itself is never handed out.
//! Each operation takes a snapshot of the list under the lock and sends
//! outside it, so a slow sink cannot stall registration or other clients.
//!
//! Delivery is at-most-once. A failed send is logged and counted; the
//! client stays registered until its own session deregisters it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use cop_relay_core::{
    ChangeEvent, EntitlementSet, StreamEvent, StreamEventType, StreamKind, TdfNote,
};
use cop_relay_perms::{filter_visible, redact_all};

use crate::error::SendError;
use crate::sink::EventSink;

/// Identifier of a connected client.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A registered client.
#[derive(Clone)]
struct ActiveClient {
    id: ClientId,
    sink: Arc<dyn EventSink>,
    /// Entitlements resolved at connect time, used when broadcast
    /// filtering is on.
    entitlements: Option<EntitlementSet>,
}

/// Outcome of a fan-out operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients that accepted the event.
    pub delivered: usize,
    /// Clients whose sink refused the event.
    pub failed: usize,
    /// Clients left out because nothing in the batch was visible to them.
    pub skipped: usize,
}

/// Registry of connected clients.
pub struct Registry {
    clients: Mutex<Vec<ActiveClient>>,
    filter_broadcasts: bool,
}

impl Registry {
    /// Create a registry that broadcasts every batch to every client.
    pub fn new() -> Self {
        Self::with_filtering(false)
    }

    /// Create a registry that, when `filter_broadcasts` is set, filters
    /// each object batch by each client's stored entitlements.
    ///
    /// A client registered without entitlements is treated as holding
    /// none and only receives unrestricted objects.
    pub fn with_filtering(filter_broadcasts: bool) -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
            filter_broadcasts,
        }
    }

    pub fn filters_broadcasts(&self) -> bool {
        self.filter_broadcasts
    }

    /// Register a client.
    ///
    /// Returns `false`, leaving the registered client in place, when the
    /// id is already taken.
    pub fn add(&self, id: ClientId, sink: Arc<dyn EventSink>) -> bool {
        self.insert(ActiveClient {
            id,
            sink,
            entitlements: None,
        })
    }

    /// Register a client together with the entitlements it connected with.
    pub fn add_with_entitlements(
        &self,
        id: ClientId,
        sink: Arc<dyn EventSink>,
        entitlements: EntitlementSet,
    ) -> bool {
        self.insert(ActiveClient {
            id,
            sink,
            entitlements: Some(entitlements),
        })
    }

    /// Deregister a client. Unknown ids are ignored.
    ///
    /// Returns whether a client was removed.
    pub fn remove(&self, id: &ClientId) -> bool {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|c| &c.id != id);
        let removed = clients.len() != before;
        if removed {
            debug!(client_id = %id, remaining = clients.len(), "client removed");
        }
        removed
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.lock().iter().any(|c| &c.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of registered clients in registration order.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.lock().iter().map(|c| c.id.clone()).collect()
    }

    /// Send a lifecycle event to one client.
    ///
    /// Returns `Ok(false)` if the client is no longer registered.
    pub async fn emit(
        &self,
        id: &ClientId,
        event_type: StreamEventType,
        detail: impl Into<String>,
    ) -> Result<bool, SendError> {
        let sink = self
            .lock()
            .iter()
            .find(|c| &c.id == id)
            .map(|c| Arc::clone(&c.sink));

        let Some(sink) = sink else {
            debug!(client_id = %id, event = event_type.as_str(), "emit to unregistered client");
            return Ok(false);
        };

        sink.send(StreamEvent::lifecycle(event_type, detail))
            .await
            .map(|()| true)
            .map_err(|e| {
                warn!(client_id = %id, event = event_type.as_str(), error = %e, "emit failed");
                e
            })
    }

    /// Send a batch of new objects to every object stream.
    ///
    /// Search attributes never leave in a broadcast. With filtering on,
    /// each client gets only the objects its entitlements allow, and a
    /// client with nothing visible is skipped.
    pub async fn broadcast(&self, events: Vec<ChangeEvent>) -> BroadcastReport {
        if events.is_empty() {
            return BroadcastReport::default();
        }

        let clients = self.snapshot(Some(StreamKind::Objects));
        let mut shared = events.clone();
        redact_all(&mut shared);

        let mut report = BroadcastReport::default();
        for client in clients {
            let batch = if self.filter_broadcasts {
                let entitlements = client.entitlements.clone().unwrap_or_default();
                let visible = filter_visible(events.clone(), &entitlements);
                if visible.is_empty() {
                    report.skipped += 1;
                    continue;
                }
                visible
            } else {
                shared.clone()
            };

            deliver(&client, StreamEvent::objects(batch), &mut report).await;
        }

        debug!(
            objects = events.len(),
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "object batch broadcast"
        );
        report
    }

    /// Send a batch of new notes to every note stream.
    pub async fn broadcast_notes(&self, notes: Vec<TdfNote>) -> BroadcastReport {
        if notes.is_empty() {
            return BroadcastReport::default();
        }

        let clients = self.snapshot(Some(StreamKind::Notes));
        let mut shared = notes.clone();
        redact_all(&mut shared);

        let mut report = BroadcastReport::default();
        for client in clients {
            let batch = if self.filter_broadcasts {
                let entitlements = client.entitlements.clone().unwrap_or_default();
                let visible = filter_visible(notes.clone(), &entitlements);
                if visible.is_empty() {
                    report.skipped += 1;
                    continue;
                }
                visible
            } else {
                shared.clone()
            };

            deliver(&client, StreamEvent::notes(batch), &mut report).await;
        }
        report
    }

    /// Send a lifecycle event to every client of every kind.
    pub async fn broadcast_lifecycle(
        &self,
        event_type: StreamEventType,
        detail: impl Into<String>,
    ) -> BroadcastReport {
        let event = StreamEvent::lifecycle(event_type, detail);
        let mut report = BroadcastReport::default();
        for client in self.snapshot(None) {
            deliver(&client, event.clone(), &mut report).await;
        }
        report
    }

    /// Tell every client the server is going away.
    pub async fn shutdown_all(&self) -> BroadcastReport {
        let event = StreamEvent::shutdown();
        let mut report = BroadcastReport::default();
        for client in self.snapshot(None) {
            deliver(&client, event.clone(), &mut report).await;
        }
        debug!(delivered = report.delivered, failed = report.failed, "shutdown sent");
        report
    }

    fn insert(&self, client: ActiveClient) -> bool {
        let mut clients = self.lock();
        if clients.iter().any(|c| c.id == client.id) {
            warn!(client_id = %client.id, "client id already registered, rejecting");
            return false;
        }
        debug!(client_id = %client.id, kind = ?client.sink.kind(), "client added");
        clients.push(client);
        true
    }

    fn snapshot(&self, kind: Option<StreamKind>) -> Vec<ActiveClient> {
        self.lock()
            .iter()
            .filter(|c| kind.map_or(true, |k| c.sink.kind() == k))
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ActiveClient>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

async fn deliver(client: &ActiveClient, event: StreamEvent, report: &mut BroadcastReport) {
    let event_type = event.event_type;
    match client.sink.send(event).await {
        Ok(()) => report.delivered += 1,
        Err(e) => {
            warn!(
                client_id = %client.id,
                event = event_type.as_str(),
                error = %e,
                "send to client failed"
            );
            report.failed += 1;
        }
    }
}
