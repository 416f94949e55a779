//! # COP Relay Permissions
//!
//! Attribute-based visibility and entitlement resolution.
//!
//! ## Overview
//!
//! Every object declares who may see it through its search attributes.
//! Every caller presents a bearer token, which the authorization platform
//! resolves to a set of entitlement labels. An object leaves the relay
//! only when the caller's labels satisfy the object's attributes.
//!
//! ## Key Concepts
//!
//! - **Policy**: [`is_visible`] applies classification (all-of),
//!   need-to-know (all-of) and releasable-to (any-of) in that order
//! - **Resolver**: [`EntitlementResolver`] turns a token into an
//!   [`EntitlementSet`](cop_relay_core::EntitlementSet); [`HttpEntitlementResolver`]
//!   calls the platform
//! - **Cache**: [`EntitlementCache`] memoises resolutions per token with
//!   a TTL and a cost budget
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use cop_relay_perms::{
//!     filter_visible, CacheConfig, EntitlementCache, HttpEntitlementResolver,
//! };
//!
//! async fn example() {
//!     let resolver =
//!         HttpEntitlementResolver::new("https://platform.example", Duration::from_secs(10))
//!             .unwrap();
//!     let cache = EntitlementCache::new(resolver, CacheConfig::default());
//!
//!     let entitlements = cache.resolve("token").await.unwrap();
//!
//!     // let objects: Vec<TdfObject> = store.query_objects(&query).await?;
//!     // let visible = filter_visible(objects, &entitlements);
//! }
//! ```

pub mod cache;
pub mod error;
pub mod policy;
pub mod resolver;

pub use cache::{CacheConfig, EntitlementCache, CACHE_KEY_PREFIX};
pub use error::{PermsError, Result};
pub use policy::{check_search, evaluate, filter_visible, is_visible, redact_all, Decision, Rule};
pub use resolver::{EntitlementResolver, HttpEntitlementResolver, ENTITLEMENTS_PATH};
