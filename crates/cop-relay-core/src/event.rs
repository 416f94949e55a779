//! Events pushed to streaming clients.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::object::{TdfNote, TdfObject};

/// Detail text sent with the shutdown event.
pub const SHUTDOWN_DETAIL: &str = "server is shutting down";

/// Kind of event on a client stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamEventType {
    /// First event on every stream.
    Connected,
    /// Periodic keep-alive.
    Heartbeat,
    /// A batch of newly inserted objects.
    TdfObjectsNew,
    /// A batch of newly inserted notes.
    TdfNotesNew,
    /// The server is going away; the client should reconnect later.
    Shutdown,
}

impl StreamEventType {
    /// Wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::Heartbeat => "HEARTBEAT",
            Self::TdfObjectsNew => "TDF_OBJECTS_NEW",
            Self::TdfNotesNew => "TDF_NOTES_NEW",
            Self::Shutdown => "SHUTDOWN",
        }
    }

    /// Lifecycle events carry no records and go to every stream kind.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Connected | Self::Heartbeat | Self::Shutdown)
    }
}

impl fmt::Display for StreamEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of records a client stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Objects,
    Notes,
}

/// Records attached to an event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "records", rename_all = "lowercase")]
pub enum EventPayload {
    #[default]
    Empty,
    Objects(Vec<TdfObject>),
    Notes(Vec<TdfNote>),
}

impl EventPayload {
    /// Number of records carried.
    pub fn len(&self) -> usize {
        match self {
            EventPayload::Empty => 0,
            EventPayload::Objects(v) => v.len(),
            EventPayload::Notes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single event delivered to a client stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub event_type: StreamEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub payload: EventPayload,
}

impl StreamEvent {
    /// A lifecycle event with free-text detail.
    pub fn lifecycle(event_type: StreamEventType, detail: impl Into<String>) -> Self {
        Self {
            event_type,
            detail: Some(detail.into()),
            payload: EventPayload::Empty,
        }
    }

    pub fn connected(detail: impl Into<String>) -> Self {
        Self::lifecycle(StreamEventType::Connected, detail)
    }

    pub fn heartbeat(detail: impl Into<String>) -> Self {
        Self::lifecycle(StreamEventType::Heartbeat, detail)
    }

    pub fn shutdown() -> Self {
        Self::lifecycle(StreamEventType::Shutdown, SHUTDOWN_DETAIL)
    }

    /// A `TDF_OBJECTS_NEW` event.
    pub fn objects(objects: Vec<TdfObject>) -> Self {
        Self {
            event_type: StreamEventType::TdfObjectsNew,
            detail: None,
            payload: EventPayload::Objects(objects),
        }
    }

    /// A `TDF_NOTES_NEW` event.
    pub fn notes(notes: Vec<TdfNote>) -> Self {
        Self {
            event_type: StreamEventType::TdfNotesNew,
            detail: None,
            payload: EventPayload::Notes(notes),
        }
    }

    /// The stream kind this event is meant for, `None` for lifecycle
    /// events that every stream accepts.
    pub fn target_kind(&self) -> Option<StreamKind> {
        match self.payload {
            EventPayload::Empty => None,
            EventPayload::Objects(_) => Some(StreamKind::Objects),
            EventPayload::Notes(_) => Some(StreamKind::Notes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(StreamEventType::TdfObjectsNew.as_str(), "TDF_OBJECTS_NEW");
        assert_eq!(
            serde_json::to_string(&StreamEventType::Heartbeat).unwrap(),
            "\"HEARTBEAT\""
        );
    }

    #[test]
    fn test_lifecycle_targets_every_kind() {
        let event = StreamEvent::shutdown();
        assert!(event.event_type.is_lifecycle());
        assert_eq!(event.target_kind(), None);
        assert_eq!(event.detail.as_deref(), Some(SHUTDOWN_DETAIL));
    }

    #[test]
    fn test_batch_targets() {
        assert_eq!(
            StreamEvent::objects(vec![]).target_kind(),
            Some(StreamKind::Objects)
        );
        assert_eq!(
            StreamEvent::notes(vec![]).target_kind(),
            Some(StreamKind::Notes)
        );
        assert!(!StreamEventType::TdfNotesNew.is_lifecycle());
    }
}
