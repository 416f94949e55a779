//! Entitlement resolution.
//!
//! The authorization platform is the source of truth for what a caller
//! may see. [`EntitlementResolver`] is the seam; [`HttpEntitlementResolver`]
//! talks to the platform's entitlements endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cop_relay_core::EntitlementSet;

use crate::error::{PermsError, Result};

/// Path of the entitlements endpoint under the platform base URL.
pub const ENTITLEMENTS_PATH: &str = "/shared/entitlements";

/// Resolves a bearer token to the caller's entitlements.
#[async_trait]
pub trait EntitlementResolver: Send + Sync {
    /// Resolve `token` to an entitlement set.
    async fn resolve(&self, token: &str) -> Result<EntitlementSet>;

    /// Check that the backing service is reachable.
    ///
    /// Used once at startup; the default assumes reachability.
    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<R: EntitlementResolver + ?Sized> EntitlementResolver for Arc<R> {
    async fn resolve(&self, token: &str) -> Result<EntitlementSet> {
        (**self).resolve(token).await
    }

    async fn probe(&self) -> Result<()> {
        (**self).probe().await
    }
}

#[derive(Serialize)]
struct EntitlementsRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct EntitlementsResponse {
    #[serde(default)]
    entitlements: Vec<EntityEntitlements>,
}

#[derive(Debug, Deserialize)]
struct EntityEntitlements {
    #[serde(default, rename = "attributeValueFqns", alias = "attribute_value_fqns")]
    attribute_value_fqns: Vec<String>,
}

impl EntitlementsResponse {
    fn into_set(self) -> EntitlementSet {
        self.entitlements
            .into_iter()
            .flat_map(|e| e.attribute_value_fqns)
            .collect()
    }
}

/// Resolver backed by the platform's HTTP entitlements endpoint.
///
/// Sends `POST {base}/shared/entitlements` with the token both as a
/// bearer `Authorization` header and in a `{"token": ...}` JSON body.
/// Every entity's attribute value FQNs are merged into one set.
#[derive(Debug, Clone)]
pub struct HttpEntitlementResolver {
    client: reqwest::Client,
    base_url: String,
    endpoint: String,
}

impl HttpEntitlementResolver {
    /// Create a resolver for the platform at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(PermsError::Configuration("empty platform endpoint".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PermsError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{base_url}{ENTITLEMENTS_PATH}"),
            base_url,
        })
    }

    /// The full entitlements URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EntitlementResolver for HttpEntitlementResolver {
    async fn resolve(&self, token: &str) -> Result<EntitlementSet> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&EntitlementsRequest { token })
            .send()
            .await
            .map_err(|e| PermsError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PermsError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: EntitlementsResponse = response
            .json()
            .await
            .map_err(|e| PermsError::InvalidResponse(e.to_string()))?;

        let entities = body.entitlements.len();
        let set = body.into_set();
        debug!(entities, labels = set.len(), "entitlements resolved");
        Ok(set)
    }

    async fn probe(&self) -> Result<()> {
        // Any HTTP answer proves reachability; only transport failures count.
        self.client
            .get(&self.base_url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| PermsError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn entitlements_handler(
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> std::result::Result<Json<Value>, StatusCode> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let token = body["token"].as_str().unwrap_or_default();

        if auth != format!("Bearer {token}") || token != "good-token" {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(Json(json!({
            "entitlements": [
                {
                    "entityId": "e-1",
                    "attributeValueFqns": [
                        "https://demo.com/attr/classification/value/secret",
                        "https://demo.com/attr/relto/value/usa"
                    ]
                },
                {
                    "entity_id": "e-2",
                    "attribute_value_fqns": ["https://demo.com/attr/ntk/value/alpha"]
                }
            ]
        })))
    }

    async fn spawn_platform() -> String {
        let app = Router::new().route(ENTITLEMENTS_PATH, post(entitlements_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_http_resolver_merges_entities() {
        let base = spawn_platform().await;
        let resolver = HttpEntitlementResolver::new(&base, Duration::from_secs(5)).unwrap();

        let set = resolver.resolve("good-token").await.unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("https://demo.com/attr/ntk/value/alpha"));
        assert!(set.contains("https://demo.com/attr/relto/value/usa"));
    }

    #[tokio::test]
    async fn test_http_resolver_non_success_is_error() {
        let base = spawn_platform().await;
        let resolver = HttpEntitlementResolver::new(&base, Duration::from_secs(5)).unwrap();

        let err = resolver.resolve("bad-token").await.unwrap_err();
        assert!(matches!(err, PermsError::Rejected { status: 401 }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_http_resolver_probe() {
        let base = spawn_platform().await;
        let resolver = HttpEntitlementResolver::new(&base, Duration::from_secs(5)).unwrap();
        resolver.probe().await.unwrap();
    }

    #[tokio::test]
    async fn test_http_resolver_unreachable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let resolver =
            HttpEntitlementResolver::new(&format!("http://{addr}/"), Duration::from_secs(2))
                .unwrap();
        assert_eq!(
            resolver.endpoint(),
            format!("http://{addr}/shared/entitlements")
        );

        let err = resolver.resolve("t").await.unwrap_err();
        assert!(err.is_transient());
        assert!(resolver.probe().await.is_err());
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(matches!(
            HttpEntitlementResolver::new("", Duration::from_secs(1)),
            Err(PermsError::Configuration(_))
        ));
    }
}
