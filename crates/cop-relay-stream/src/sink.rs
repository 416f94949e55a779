//! Outbound event sinks.
//!
//! A sink is the one capability the registry needs from a client
//! connection: accept an event or say why not. The RPC layer provides one
//! implementation per stream kind; [`ChannelSink`] is the in-process one,
//! backed by a bounded tokio channel the transport drains.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

use cop_relay_core::{StreamEvent, StreamKind};

use crate::error::SendError;

/// Outbound side of one client stream.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Which payload kind this stream carries. Lifecycle events are
    /// accepted by every kind.
    fn kind(&self) -> StreamKind;

    /// Deliver one event.
    async fn send(&self, event: StreamEvent) -> Result<(), SendError>;
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn kind(&self) -> StreamKind {
        (**self).kind()
    }

    async fn send(&self, event: StreamEvent) -> Result<(), SendError> {
        (**self).send(event).await
    }
}

/// Sink backed by a bounded channel.
///
/// Sends never wait: a full buffer is reported as [`SendError::Full`]
/// so one slow reader cannot hold up delivery to everyone else.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    kind: StreamKind,
    tx: mpsc::Sender<StreamEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport reads from.
    pub fn new(kind: StreamKind, capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { kind, tx }, rx)
    }

    pub fn objects(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        Self::new(StreamKind::Objects, capacity)
    }

    pub fn notes(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        Self::new(StreamKind::Notes, capacity)
    }

    /// Whether the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl EventSink for ChannelSink {
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

        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cop_relay_core::StreamEventType;

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::objects(4);
        sink.send(StreamEvent::connected("hi")).await.unwrap();
        sink.send(StreamEvent::objects(vec![])).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type, StreamEventType::Connected);
        assert_eq!(
            rx.recv().await.unwrap().event_type,
            StreamEventType::TdfObjectsNew
        );
    }

    #[tokio::test]
    async fn test_wrong_kind_rejected() {
        let (sink, _rx) = ChannelSink::notes(4);
        let err = sink.send(StreamEvent::objects(vec![])).await.unwrap_err();
        assert_eq!(
            err,
            SendError::WrongKind {
                event: StreamEventType::TdfObjectsNew,
                kind: StreamKind::Notes,
            }
        );

        // Lifecycle events go to every kind.
        sink.send(StreamEvent::heartbeat("alive:1s")).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_and_closed() {
        let (sink, rx) = ChannelSink::objects(1);
        sink.send(StreamEvent::heartbeat("a")).await.unwrap();
        assert_eq!(
            sink.send(StreamEvent::heartbeat("b")).await.unwrap_err(),
            SendError::Full
        );

        drop(rx);
        assert!(sink.is_closed());
        assert_eq!(
            sink.send(StreamEvent::heartbeat("c")).await.unwrap_err(),
            SendError::Closed
        );
    }
}
