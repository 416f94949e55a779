//! The object service: the operations the RPC layer exposes.
//!
//! Every read resolves the caller's entitlements first, then filters the
//! result through the visibility policy. Hidden objects are dropped
//! outright and search attributes never leave, visible or not.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cop_relay_core::{EntitlementSet, ObjectId, StreamEvent, StreamKind, TdfObject};
use cop_relay_perms::{filter_visible, EntitlementCache, EntitlementResolver};
use cop_relay_store::{ObjectQuery, ObjectStore};
use cop_relay_stream::{ChannelSink, EventSink, Registry, Session, SessionConfig, SessionReport};

use crate::error::{RelayError, Result};

/// Strip an optional `Bearer ` scheme from an authorization value.
///
/// An empty token is a caller error.
pub fn normalize_token(authorization: &str) -> Result<&str> {
    let value = authorization.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();
    if token.is_empty() {
        return Err(RelayError::MissingToken);
    }
    Ok(token)
}

/// Query, lookup and subscription operations.
pub struct ObjectService<S, R> {
    store: Arc<S>,
    entitlements: Arc<EntitlementCache<R>>,
    registry: Arc<Registry>,
    session: SessionConfig,
    sink_capacity: usize,
    shutdown: CancellationToken,
}

impl<S: ObjectStore, R: EntitlementResolver> ObjectService<S, R> {
    pub fn new(
        store: Arc<S>,
        entitlements: Arc<EntitlementCache<R>>,
        registry: Arc<Registry>,
        session: SessionConfig,
        sink_capacity: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            entitlements,
            registry,
            session,
            sink_capacity,
            shutdown,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn entitlement_cache(&self) -> &EntitlementCache<R> {
        &self.entitlements
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// The caller's entitlements.
    pub async fn get_entitlements(&self, authorization: &str) -> Result<EntitlementSet> {
        let token = normalize_token(authorization)?;
        Ok(self.entitlements.resolve(token).await?)
    }

    /// Objects matching `query` that the caller may see, newest first.
    pub async fn query_objects(
        &self,
        authorization: &str,
        query: &ObjectQuery,
    ) -> Result<Vec<TdfObject>> {
        if query.source_type.trim().is_empty() {
            return Err(RelayError::InvalidQuery("source type is required".into()));
        }
        if let Some(geometry) = &query.within {
            geometry.validate()?;
        }

        let entitlements = self.get_entitlements(authorization).await?;
        let candidates = self.store.query_objects(query).await?;
        let total = candidates.len();
        let visible = filter_visible(candidates, &entitlements);

        debug!(
            source_type = %query.source_type,
            total,
            visible = visible.len(),
            "query answered"
        );
        Ok(visible)
    }

    /// One object, if it exists and the caller may see it.
    ///
    /// A hidden object is reported the same way as a missing one.
    pub async fn get_object(&self, authorization: &str, id: &str) -> Result<Option<TdfObject>> {
        let id = ObjectId::parse(id).map_err(|_| RelayError::InvalidId(id.to_string()))?;
        let entitlements = self.get_entitlements(authorization).await?;

        let Some(object) = self.store.get_object(&id).await? else {
            return Ok(None);
        };
        Ok(filter_visible(vec![object], &entitlements).pop())
    }

    /// Every known source type.
    pub async fn list_source_types(&self) -> Result<Vec<String>> {
        Ok(self.store.list_source_types().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Streaming
    // ─────────────────────────────────────────────────────────────────────────

    /// A bounded in-process sink sized for one client.
    pub fn channel_sink(&self, kind: StreamKind) -> (Arc<ChannelSink>, mpsc::Receiver<StreamEvent>) {
        let (sink, rx) = ChannelSink::new(kind, self.sink_capacity);
        (Arc::new(sink), rx)
    }

    /// Register a new stream client.
    ///
    /// When broadcasts are filtered the caller's entitlements are resolved
    /// now and kept with the client; otherwise no token is needed.
    pub async fn subscribe(
        &self,
        authorization: &str,
        sink: Arc<dyn EventSink>,
    ) -> Result<Session> {
        let entitlements = if self.registry.filters_broadcasts() {
            Some(self.get_entitlements(authorization).await?)
        } else {
            None
        };

        let session = Session::open(
            Arc::clone(&self.registry),
            sink,
            entitlements,
            self.session.clone(),
        )?;
        info!(client_id = %session.id(), "stream subscribed");
        Ok(session)
    }

    /// Subscribe and serve the stream until `cancel` fires or the relay
    /// shuts down.
    pub async fn stream(
        &self,
        authorization: &str,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Result<SessionReport> {
        let session = self.subscribe(authorization, sink).await?;
        let token = self.shutdown.child_token();

        let run = session.run(token.clone());
        tokio::pin!(run);

        tokio::select! {
            report = &mut run => return Ok(report),
            _ = cancel.cancelled() => token.cancel(),
        }
        Ok(run.await)
    }
}
