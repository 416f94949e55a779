//! The relay runtime.
//!
//! Wires the store, the entitlement cache, the registry and the listener
//! together, and owns the shutdown token every background task hangs off.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cop_relay_perms::{EntitlementCache, EntitlementResolver};
use cop_relay_store::{NotificationFeed, ObjectStore};
use cop_relay_stream::{BroadcastReport, Listener, ListenerState, ListenerStats, Registry};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::service::ObjectService;

/// A running relay.
pub struct Relay<S, R> {
    service: Arc<ObjectService<S, R>>,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
    listener: JoinHandle<()>,
    listener_state: watch::Receiver<ListenerState>,
    listener_stats: Arc<ListenerStats>,
}

impl<S, R> Relay<S, R>
where
    S: ObjectStore + 'static,
    R: EntitlementResolver + 'static,
{
    /// Check collaborators and start the listener.
    ///
    /// Fails if the configuration is invalid, the store cannot be reached
    /// or the authorization platform cannot be reached.
    pub async fn start<F>(config: &RelayConfig, feed: F, store: S, resolver: R) -> Result<Self>
    where
        F: NotificationFeed + 'static,
    {
        config.validate()?;

        feed.ping()
            .await
            .map_err(|e| RelayError::Startup(format!("store unreachable: {e}")))?;
        resolver
            .probe()
            .await
            .map_err(|e| RelayError::Startup(format!("authorization platform unreachable: {e}")))?;

        let shutdown = CancellationToken::new();
        let registry = Arc::new(Registry::with_filtering(config.stream.filter_broadcasts));

        let listener = Listener::new(feed, Arc::clone(&registry), config.listener_config())?;
        let listener_state = listener.state();
        let listener_stats = listener.stats();
        let listener = tokio::spawn(listener.run(shutdown.child_token()));

        let cache = Arc::new(EntitlementCache::new(resolver, config.cache_config()));
        let service = Arc::new(ObjectService::new(
            Arc::new(store),
            cache,
            Arc::clone(&registry),
            config.session_config(),
            config.stream.sink_capacity,
            shutdown.clone(),
        ));

        info!(
            channel = %config.notify_channel,
            filter_broadcasts = config.stream.filter_broadcasts,
            "relay started"
        );

        Ok(Self {
            service,
            registry,
            shutdown,
            listener,
            listener_state,
            listener_stats,
        })
    }

    pub fn service(&self) -> Arc<ObjectService<S, R>> {
        Arc::clone(&self.service)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Watch the listener's connection state.
    pub fn listener_state(&self) -> watch::Receiver<ListenerState> {
        self.listener_state.clone()
    }

    pub fn listener_stats(&self) -> &ListenerStats {
        &self.listener_stats
    }

    /// Token cancelled when the relay shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Tell every client, stop every session and the listener, and wait
    /// for the listener to exit.
    pub async fn shutdown(self) -> BroadcastReport {
        let report = self.registry.shutdown_all().await;
        self.shutdown.cancel();

        if let Err(e) = self.listener.await {
            error!(error = %e, "listener task failed");
        }
        info!(notified = report.delivered, "relay stopped");
        report
    }
}
