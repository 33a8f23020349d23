//! # keel-core
//!
//! Core types, traits, and error handling for the keel snapshot cache.
//!
//! This crate provides the foundational types used across the other keel
//! crates:
//!
//! - [`XdsError`] - Error type with gRPC status code mapping
//! - [`Node`] - Client identity descriptor to which snapshots are keyed
//! - [`NodeHash`] - Capability trait mapping a node to its cache key
//! - [`Resource`] - Trait for implementing custom resource types
//! - [`ResourceWithTtl`] - A resource paired with an optional heartbeat TTL
//! - [`TypeUrl`] - Type URL handling and constants
//! - [`ResourceVersion`] - Opaque, equality-compared version strings
//!
//! ## Example
//!
//! ```rust
//! use keel_core::{FnvHash, Node, NodeHash};
//!
//! let node = Node::new("my-envoy-node");
//! let key = FnvHash.id(&node);
//! assert_eq!(key.len(), 16);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod node;
mod resource;
mod type_url;
mod version;

pub use error::XdsError;
pub use node::{FnvHash, IdHash, Node, NodeHash};
pub use resource::{AnyResource, BoxResource, Resource, ResourceWithTtl};
pub use type_url::{well_known, TypeUrl};
pub use version::ResourceVersion;

/// Result type alias using [`XdsError`].
pub type Result<T> = std::result::Result<T, XdsError>;
