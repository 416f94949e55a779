//! # COP Relay Testkit
//!
//! Testing utilities for the COP relay.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Payload vectors**: Notification payloads with the outcome the parser must produce
//! - **Generators**: Proptest strategies for labels, attributes and entitlement sets
//! - **Fixtures**: Builders for stored objects and notification payloads
//! - **Stubs**: Counting and failing resolvers, recording and failing sinks
//!
//! ## Payload Vectors
//!
//! ```rust
//! use cop_relay_testkit::vectors::verify_all_vectors;
//!
//! for (name, passed, detail) in verify_all_vectors() {
//!     assert!(passed, "{name}: {detail}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cop_relay_perms::is_visible;
//! use cop_relay_testkit::generators::{entitlement_set, visibility_attributes};
//!
//! proptest! {
//!     #[test]
//!     fn visibility_is_deterministic(attrs in visibility_attributes(), ents in entitlement_set()) {
//!         prop_assert_eq!(is_visible(&attrs, &ents), is_visible(&attrs, &ents));
//!     }
//! }
//! ```
//!
//! ## Fixtures
//!
//! ```rust
//! use cop_relay_testkit::fixtures::{ObjectBuilder, PayloadBuilder};
//!
//! let object = ObjectBuilder::new("radar").classified(&["secret"]).build();
//! let payload = PayloadBuilder::new().source_type("radar").hex_blob(b"hello").build();
//! ```

pub mod fixtures;
pub mod generators;
pub mod stubs;
pub mod vectors;

pub use fixtures::{entitlements, search_attributes, timestamp, ObjectBuilder, PayloadBuilder};
pub use stubs::{CountingResolver, FailingResolver, FailingSink, RecordingSink};
pub use vectors::{all_vectors, check_vector, verify_all_vectors, Expected, NotificationVector};
