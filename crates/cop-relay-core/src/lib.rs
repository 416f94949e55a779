//! # COP Relay Core
//!
//! Pure data model for the relay: stored objects, the attributes that
//! govern who may see them, and the events pushed to streaming clients.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`TdfObject`] - A stored object with opaque encrypted content ([`ChangeEvent`] when freshly inserted)
//! - [`VisibilityAttributes`] - Decoded classification / need-to-know / releasable-to labels
//! - [`EntitlementSet`] - Labels a caller holds
//! - [`StreamEvent`] - One event on a client stream
//!
//! ## Notifications
//!
//! Insert notifications from the store are parsed with
//! [`parse_notification`]. See the [`notification`] module for the payload
//! format.

pub mod attributes;
pub mod error;
pub mod event;
pub mod geometry;
pub mod notification;
pub mod object;
pub mod types;

pub use attributes::{EntitlementSet, VisibilityAttributes};
pub use error::{CoreError, PayloadError};
pub use event::{EventPayload, StreamEvent, StreamEventType, StreamKind, SHUTDOWN_DETAIL};
pub use geometry::{BoundingBox, Geometry};
pub use notification::{decode_content_blob, parse_notification, parse_timestamp};
pub use object::{ChangeEvent, Labeled, TdfNote, TdfObject};
pub use types::ObjectId;
