//! Version table per endpoint
//!
//! [`RouteCatalog`] records which versions serve each `(method, path)` pair.
//! It does not invoke handlers; `H` is whatever the host stores per version.

use crate::error::{Result, VersioningError};
use crate::version::ApiVersion;
use std::collections::BTreeMap;
use tracing::debug;

/// Key identifying an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    /// Upper-case HTTP method
    pub method: String,
    /// Route path as registered
    pub path: String,
}

impl RouteKey {
    /// Create a key; the method is upper-cased
    pub fn new(method: &str, path: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.into(),
        }
    }
}

/// Endpoint -> version -> handler table
#[derive(Debug, Clone)]
pub struct RouteCatalog<H> {
    routes: BTreeMap<RouteKey, BTreeMap<ApiVersion, H>>,
}

impl<H> Default for RouteCatalog<H> {
    fn default() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }
}

impl<H> RouteCatalog<H> {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method path` at `version`
    ///
    /// Fails with [`VersioningError::Conflict`] if that version is already taken.
    pub fn add(&mut self, method: &str, path: &str, version: ApiVersion, handler: H) -> Result<()> {
        let key = RouteKey::new(method, path);
        let versions = self.routes.entry(key.clone()).or_default();

        if versions.contains_key(&version) {
            return Err(VersioningError::Conflict {
                method: key.method,
                path: key.path,
                version,
            });
        }

        debug!(method = %key.method, path = %key.path, version = %version, "Registered versioned route");
        versions.insert(version, handler);
        Ok(())
    }

    /// Builder form of [`RouteCatalog::add`]
    pub fn route(mut self, method: &str, path: &str, version: ApiVersion, handler: H) -> Result<Self> {
        self.add(method, path, version, handler)?;
        Ok(self)
    }

    /// Remove one version of an endpoint
    pub fn remove(&mut self, method: &str, path: &str, version: &ApiVersion) -> Option<H> {
        let key = RouteKey::new(method, path);
        let versions = self.routes.get_mut(&key)?;
        let removed = versions.remove(version);
        if versions.is_empty() {
            self.routes.remove(&key);
        }
        removed
    }

    /// Handler for an exact version
    pub fn get(&self, method: &str, path: &str, version: &ApiVersion) -> Option<&H> {
        self.routes
            .get(&RouteKey::new(method, path))
            .and_then(|versions| versions.get(version))
    }

    /// Versions serving an endpoint, ascending
    pub fn versions_for(&self, method: &str, path: &str) -> Vec<ApiVersion> {
        self.routes
            .get(&RouteKey::new(method, path))
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Newest version serving an endpoint
    pub fn latest_for(&self, method: &str, path: &str) -> Option<ApiVersion> {
        self.routes
            .get(&RouteKey::new(method, path))
            .and_then(|versions| versions.keys().next_back().cloned())
    }

    /// Every endpoint with its versions
    pub fn endpoints(&self) -> impl Iterator<Item = (&RouteKey, Vec<&ApiVersion>)> {
        self.routes
            .iter()
            .map(|(key, versions)| (key, versions.keys().collect()))
    }

    /// Number of (endpoint, version) entries
    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
