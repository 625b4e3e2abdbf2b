//! Asset identity resolution.
//!
//! Assets are looked up under more than one identifier: a *local* id scoped
//! to the owning collection, and a *global* catalog id that the remote cache
//! is keyed by. A single pricing update therefore has to clear cache entries
//! under every alias the asset is known by.
//!
//! Callers hand over whatever shape they have — a bare id string, a partial
//! [`AssetIdentity`] record, or a collection of either — and
//! [`resolve_aliases`] normalizes it into one [`AliasSet`]. Downstream code
//! never sees the heterogeneous input.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A logical reference to one asset, possibly known by two identifier
/// aliases.
///
/// At least one alias must be non-empty for the identity to be useful;
/// identities where both are missing resolve to nothing and the enclosing
/// operation becomes a no-op. When both are present they refer to the same
/// logical asset and are treated as equivalent for invalidation.
///
/// Constructed per call from caller-supplied data, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIdentity {
    /// Identifier scoped to the owning collection.
    #[serde(default)]
    pub local_id: Option<String>,
    /// Canonical catalog identifier, preferred by the remote cache.
    #[serde(default)]
    pub global_id: Option<String>,
}

impl AssetIdentity {
    /// Identity known only by its collection-scoped id.
    pub fn local(id: impl Into<String>) -> Self {
        Self {
            local_id: Some(id.into()),
            global_id: None,
        }
    }

    /// Identity known only by its catalog id.
    pub fn global(id: impl Into<String>) -> Self {
        Self {
            local_id: None,
            global_id: Some(id.into()),
        }
    }

    /// Identity known by both aliases.
    pub fn new(local_id: impl Into<String>, global_id: impl Into<String>) -> Self {
        Self {
            local_id: Some(local_id.into()),
            global_id: Some(global_id.into()),
        }
    }

    /// Non-empty aliases, local first.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.local_id
            .as_deref()
            .into_iter()
            .chain(self.global_id.as_deref())
            .filter(|alias| !alias.is_empty())
    }

    /// The alias the remote cache is canonically keyed by: the global id
    /// when present, otherwise the local one.
    pub fn server_alias(&self) -> Option<&str> {
        self.global_id
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .or_else(|| self.local_id.as_deref().filter(|alias| !alias.is_empty()))
    }
}

/// One element of the heterogeneous input accepted by the public
/// invalidation operations: either a bare identifier string or a (partial)
/// identity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// A bare identifier string, treated as a single alias.
    Id(String),
    /// A partial or complete identity record.
    Identity(AssetIdentity),
}

impl From<&str> for AssetRef {
    fn from(id: &str) -> Self {
        AssetRef::Id(id.to_string())
    }
}

impl From<String> for AssetRef {
    fn from(id: String) -> Self {
        AssetRef::Id(id)
    }
}

impl From<AssetIdentity> for AssetRef {
    fn from(identity: AssetIdentity) -> Self {
        AssetRef::Identity(identity)
    }
}

/// Deduplicated, order-independent set of non-empty aliases produced by one
/// resolution call.
///
/// Backed by a `BTreeSet` so iteration order is deterministic, which keeps
/// fan-out logging and tests stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasSet(BTreeSet<String>);

impl AliasSet {
    /// True when no non-empty alias could be derived. The enclosing
    /// operation must treat this as a no-op instead of issuing wildcard-like
    /// invalidations for missing keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.0.contains(alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    fn insert(&mut self, alias: &str) {
        if !alias.is_empty() {
            self.0.insert(alias.to_string());
        }
    }
}

impl<S: Into<String>> FromIterator<S> for AliasSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = AliasSet::default();
        for alias in iter {
            let alias = alias.into();
            set.insert(&alias);
        }
        set
    }
}

/// Resolve a collection of asset references into the union of their
/// non-empty aliases.
///
/// Element order is irrelevant and duplicates collapse. An empty result
/// means every input was empty; callers short-circuit to a no-op in that
/// case.
pub fn resolve_aliases(refs: &[AssetRef]) -> AliasSet {
    let mut set = AliasSet::default();
    for asset_ref in refs {
        match asset_ref {
            AssetRef::Id(id) => set.insert(id),
            AssetRef::Identity(identity) => {
                for alias in identity.aliases() {
                    set.insert(alias);
                }
            }
        }
    }
    set
}

/// Resolve the server-preferred alias per input: the global id when both
/// aliases exist, since the remote cache is canonically keyed by it.
///
/// Used only by the server-side invalidator; the client cache keeps entries
/// under every alias and uses [`resolve_aliases`] instead.
pub fn resolve_server_aliases(refs: &[AssetRef]) -> AliasSet {
    let mut set = AliasSet::default();
    for asset_ref in refs {
        match asset_ref {
            AssetRef::Id(id) => set.insert(id),
            AssetRef::Identity(identity) => {
                if let Some(alias) = identity.server_alias() {
                    set.insert(alias);
                }
            }
        }
    }
    set
}
