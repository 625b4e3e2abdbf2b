//! Core types for the Pricefolio pricing cache.
//!
//! This crate owns the pure, backend-free half of the invalidation
//! subsystem:
//!
//! - [`identity`] — resolving heterogeneous asset references (bare id
//!   strings, partial identity records, collections of either) into a
//!   normalized [`AliasSet`]
//! - [`artifact`] — the static registry mapping each cached artifact kind
//!   to its key templates and namespace prefixes
//! - [`error`] — the shared error taxonomy
//!
//! The actual cache backends live in `pricefolio-invalidation`; everything
//! here is deterministic and synchronous so it can be tested without a
//! runtime.

pub mod artifact;
pub mod error;
pub mod identity;

pub use artifact::{ArtifactKind, KeyPattern, all_artifact_kinds, patterns_for};
pub use error::{InvalidationError, Result};
pub use identity::{AliasSet, AssetIdentity, AssetRef, resolve_aliases, resolve_server_aliases};
