//! Change ingestion listener.
//!
//! The listener holds one subscription on the store's notification
//! channel for the life of the process. Every notification is parsed into
//! a [`ChangeEvent`](cop_relay_core::ChangeEvent) and broadcast. A
//! payload that does not parse is logged and dropped; the subscription
//! carries on. A connection failure moves the listener back to
//! `Disconnected` and it reconnects after an exponential, jittered
//! backoff. Only cancellation stops it.
//!
//! ```text
//! Disconnected -> Connecting -> Listening
//!      ^              |             |
//!      +--------------+-------------+   (error: back off, retry)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cop_relay_core::parse_notification;
use cop_relay_store::{NotificationFeed, StoreError, Subscription};

use crate::error::{Result, StreamError};
use crate::registry::Registry;

/// Channel the store's insert trigger publishes on.
pub const DEFAULT_CHANNEL: &str = "tdf_objects_inserted";

/// Where the listener is in its connection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    Connecting,
    /// Subscribed; the only state in which events are broadcast.
    Listening,
    /// Shut down. Terminal.
    Stopped,
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Notification channel to subscribe to.
    pub channel: String,
    /// Delay before the first reconnect.
    pub initial_backoff: Duration,
    /// Upper bound on the reconnect delay.
    pub max_backoff: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ListenerConfig {
    fn validate(&self) -> Result<()> {
        if self.channel.is_empty() {
            return Err(StreamError::InvalidConfig("empty channel name".into()));
        }
        if self.initial_backoff.is_zero() {
            return Err(StreamError::InvalidConfig("initial backoff must be positive".into()));
        }
        if self.max_backoff < self.initial_backoff {
            return Err(StreamError::InvalidConfig(
                "max backoff is below initial backoff".into(),
            ));
        }
        Ok(())
    }
}

/// Counters kept by a running listener.
#[derive(Debug, Default)]
pub struct ListenerStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
    reconnects: AtomicU64,
}

impl ListenerStats {
    /// Notifications parsed and broadcast.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Notifications dropped because they did not parse.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Times the subscription was lost or could not be opened.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

/// Exponential backoff with jitter.
#[derive(Debug)]
struct Backoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            attempt: 0,
        }
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    /// The next delay: a random point in the upper half of the current
    /// exponential step.
    fn next_delay(&mut self) -> Duration {
        let factor = 1u32.checked_shl(self.attempt.min(16)).unwrap_or(u32::MAX);
        let step = self.initial.saturating_mul(factor).min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        let half = step / 2;
        let jitter_ms = half.as_millis() as u64;
        if jitter_ms == 0 {
            return step;
        }
        half + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

enum PumpEnd {
    Cancelled,
    Failed(StoreError),
    Closed,
}

/// Supervised listener task.
pub struct Listener<F> {
    feed: F,
    registry: Arc<Registry>,
    config: ListenerConfig,
    state: watch::Sender<ListenerState>,
    stats: Arc<ListenerStats>,
}

impl<F: NotificationFeed> Listener<F> {
    /// Create a listener that broadcasts into `registry`.
    pub fn new(feed: F, registry: Arc<Registry>, config: ListenerConfig) -> Result<Self> {
        config.validate()?;
        let (state, _) = watch::channel(ListenerState::Disconnected);
        Ok(Self {
            feed,
            registry,
            config,
            state,
            stats: Arc::new(ListenerStats::default()),
        })
    }

    /// Watch the listener's state.
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let channel = self.config.channel.as_str();
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);
        let mut attempt: u64 = 0;

        while !cancel.is_cancelled() {
            attempt += 1;
            self.set_state(ListenerState::Connecting);

            let subscribed = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.feed.subscribe(channel) => result,
            };

            match subscribed {
                Ok(mut subscription) => {
                    self.set_state(ListenerState::Listening);
                    info!(channel, attempt, "listener subscribed");
                    backoff.reset();
                    attempt = 0;

                    match self.pump(&mut *subscription, &cancel).await {
                        PumpEnd::Cancelled => break,
                        PumpEnd::Failed(e) => {
                            error!(channel, error = %e, "listener connection lost");
                        }
                        PumpEnd::Closed => {
                            error!(channel, "listener connection closed");
                        }
                    }
                }
                Err(e) => {
                    error!(channel, attempt, error = %e, "listener failed to subscribe");
                }
            }

            self.set_state(ListenerState::Disconnected);
            self.stats.reconnects.fetch_add(1, Ordering::Relaxed);

            let delay = backoff.next_delay();
            info!(channel, delay_ms = delay.as_millis() as u64, "listener reconnecting");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ListenerState::Stopped);
        info!(channel, "listener stopped");
    }

    async fn pump(
        &self,
        subscription: &mut dyn Subscription,
        cancel: &CancellationToken,
    ) -> PumpEnd {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return PumpEnd::Cancelled,
                next = subscription.next_notification() => next,
            };

            match next {
                Some(Ok(notification)) => self.handle(&notification.payload).await,
                Some(Err(e)) => return PumpEnd::Failed(e),
                None => return PumpEnd::Closed,
            }
        }
    }

    async fn handle(&self, payload: &str) {
        match parse_notification(payload) {
            Ok(event) => {
                debug!(id = %event.id, source_type = %event.source_type, "change notification");
                self.registry.broadcast(vec![event]).await;
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(error = %e, len = payload.len(), "dropping malformed notification");
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn set_state(&self, state: ListenerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "listener state");
        }
    }
}
