//! Stub collaborators.
//!
//! Resolvers that count their calls or always fail, and sinks that record
//! what they were sent or refuse everything.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use cop_relay_core::{EntitlementSet, EventPayload, StreamEvent, StreamEventType, StreamKind, TdfObject};
use cop_relay_perms::{EntitlementResolver, PermsError};
use cop_relay_stream::{EventSink, SendError};

/// Resolver with a fixed token table that counts every call.
///
/// Unknown tokens are rejected with status 401.
#[derive(Debug, Default)]
pub struct CountingResolver {
    grants: HashMap<String, EntitlementSet>,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `labels` to `token`.
    pub fn with_token(mut self, token: &str, labels: &[&str]) -> Self {
        self.grants
            .insert(token.to_string(), labels.iter().copied().collect());
        self
    }

    /// Calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitlementResolver for CountingResolver {
    async fn resolve(&self, token: &str) -> Result<EntitlementSet, PermsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.grants
            .get(token)
            .cloned()
            .ok_or(PermsError::Rejected { status: 401 })
    }
}

/// Resolver whose service is always down.
#[derive(Debug, Default)]
pub struct FailingResolver {
    calls: AtomicUsize,
}

impl FailingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitlementResolver for FailingResolver {
    async fn resolve(&self, _token: &str) -> Result<EntitlementSet, PermsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PermsError::Unavailable("connection refused".into()))
    }

    async fn probe(&self) -> Result<(), PermsError> {
        Err(PermsError::Unavailable("connection refused".into()))
    }
}

/// Sink that keeps every event it accepts.
#[derive(Debug)]
pub struct RecordingSink {
    kind: StreamKind,
    events: Mutex<Vec<StreamEvent>>,
}

impl RecordingSink {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn objects() -> Self {
        Self::new(StreamKind::Objects)
    }

    pub fn notes() -> Self {
        Self::new(StreamKind::Notes)
    }

    /// Everything received so far.
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events of one type, in arrival order.
    pub fn of_type(&self, event_type: StreamEventType) -> Vec<StreamEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Every object received in `TDF_OBJECTS_NEW` events.
    pub fn objects_received(&self) -> Vec<TdfObject> {
        self.events()
            .into_iter()
            .flat_map(|e| match e.payload {
                EventPayload::Objects(objects) => objects,
                _ => Vec::new(),
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    async fn send(&self, event: StreamEvent) -> Result<(), SendError> {
        if let Some(target) = event.target_kind() {
            if target != self.kind {
                return Err(SendError::WrongKind {
                    event: event.event_type,
                    kind: self.kind,
                });
            }
        }
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }
}

/// Sink that refuses every event with the same error.
#[derive(Debug)]
pub struct FailingSink {
    kind: StreamKind,
    error: SendError,
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new(kind: StreamKind, error: SendError) -> Self {
        Self {
            kind,
            error,
            attempts: AtomicUsize::new(0),
        }
    }

    /// An object sink whose transport is broken.
    pub fn broken() -> Self {
        Self::new(StreamKind::Objects, SendError::Transport("broken pipe".into()))
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for FailingSink {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    async fn send(&self, _event: StreamEvent) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_resolver() {
        let resolver = CountingResolver::new().with_token("t", &["a", "b"]);
        let set = resolver.resolve("t").await.unwrap();
        assert!(set.contains_all(&["a", "b"]));
        assert!(matches!(
            resolver.resolve("other").await,
            Err(PermsError::Rejected { status: 401 })
        ));
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_recording_sink_checks_kind() {
        let sink = RecordingSink::notes();
        assert!(sink.send(StreamEvent::objects(vec![])).await.is_err());
        sink.send(StreamEvent::heartbeat("alive:0s")).await.unwrap();
        assert_eq!(sink.of_type(StreamEventType::Heartbeat).len(), 1);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_sink_counts() {
        let sink = FailingSink::broken();
        assert!(sink.send(StreamEvent::shutdown()).await.is_err());
        assert_eq!(sink.attempts(), 1);
    }
}
