//! Per-connection stream session.
//!
//! A session is one client's live subscription. Opening it registers the
//! client; running it sends CONNECTED and then a heartbeat on a fixed
//! interval until the connection's cancellation token fires. Dropping the
//! session deregisters the client, so cleanup also happens when the
//! owning task is aborted mid-await.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cop_relay_core::{EntitlementSet, StreamEventType};

use crate::error::{self, SendError, StreamError};
use crate::registry::{ClientId, Registry};
use crate::sink::EventSink;

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time between heartbeats.
    pub heartbeat_interval: Duration,
}

impl SessionConfig {
    pub(crate) fn validate(&self) -> error::Result<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(StreamError::InvalidConfig(
                "heartbeat interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connection's token was cancelled.
    Cancelled,
    /// The client's sink closed.
    SinkClosed,
}

/// Summary of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub heartbeats: u64,
    pub failed_sends: u64,
    pub ended: SessionEnd,
}

/// A registered client stream.
pub struct Session {
    id: ClientId,
    registry: Arc<Registry>,
    config: SessionConfig,
}

impl Session {
    /// Register a new client with a fresh id.
    ///
    /// `entitlements` are stored with the client for broadcast filtering.
    /// Fails, registering nothing, on a zero heartbeat interval.
    pub fn open(
        registry: Arc<Registry>,
        sink: Arc<dyn EventSink>,
        entitlements: Option<EntitlementSet>,
        config: SessionConfig,
    ) -> error::Result<Self> {
        config.validate()?;

        let id = ClientId::random();
        let added = match entitlements {
            Some(set) => registry.add_with_entitlements(id.clone(), sink, set),
            None => registry.add(id.clone(), sink),
        };
        if !added {
            return Err(StreamError::DuplicateClient(id.to_string()));
        }
        Ok(Self {
            id,
            registry,
            config,
        })
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Run until `cancel` fires or the client goes away.
    ///
    /// The client is deregistered when this returns.
    pub async fn run(self, cancel: CancellationToken) -> SessionReport {
        let started = Instant::now();
        let mut report = SessionReport {
            heartbeats: 0,
            failed_sends: 0,
            ended: SessionEnd::Cancelled,
        };

        info!(client_id = %self.id, "client connected");
        let detail = format!("connected on {}", Utc::now().to_rfc3339());
        if let Err(SendError::Closed) = self.send(StreamEventType::Connected, detail, &mut report).await {
            report.ended = SessionEnd::SinkClosed;
            return self.finish(report);
        }

        let period = self.config.heartbeat_interval;
        let mut ticker = tokio::time::interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let detail = format!("alive:{}s", started.elapsed().as_secs());
                    match self.send(StreamEventType::Heartbeat, detail, &mut report).await {
                        Ok(()) => report.heartbeats += 1,
                        Err(SendError::Closed) => {
                            report.ended = SessionEnd::SinkClosed;
                            break;
                        }
                        Err(_) => {}
                    }
                }
            }
        }

        self.finish(report)
    }

    async fn send(
        &self,
        event_type: StreamEventType,
        detail: String,
        report: &mut SessionReport,
    ) -> Result<(), SendError> {
        match self.registry.emit(&self.id, event_type, detail).await {
            Ok(_) => Ok(()),
            Err(e) => {
                report.failed_sends += 1;
                Err(e)
            }
        }
    }

    fn finish(self, report: SessionReport) -> SessionReport {
        info!(
            client_id = %self.id,
            heartbeats = report.heartbeats,
            ended = ?report.ended,
            "client disconnected"
        );
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.registry.remove(&self.id) {
            debug!(client_id = %self.id, "session deregistered");
        } else {
            warn!(client_id = %self.id, "session was already deregistered");
        }
    }
}
