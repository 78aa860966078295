//! Registry of supported versions and their metadata
//!
//! The registry owns the canonical [`VersionRecord`] set and the
//! [`CompatibilityMatrix`]. It is built once by the host and shared by
//! reference (typically in an `Arc`).

use crate::compat::{CompatibilityMatrix, CompatibilityRule, NegotiationPolicy, Negotiator};
use crate::error::{Result, VersioningError};
use crate::record::{DeprecationInfo, Lifecycle, Stability, VersionInfo, VersionRecord};
use crate::version::{ApiVersion, VersionRange};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Thread-safe store of registered versions
#[derive(Debug, Default)]
pub struct VersionRegistry {
    records: RwLock<BTreeMap<ApiVersion, VersionRecord>>,
    matrix: RwLock<CompatibilityMatrix>,
    generation: AtomicU64,
}

impl VersionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry using `matrix` for negotiation
    pub fn with_matrix(matrix: CompatibilityMatrix) -> Self {
        Self {
            records: RwLock::default(),
            matrix: RwLock::new(matrix),
            generation: AtomicU64::new(0),
        }
    }

    fn records(&self) -> RwLockReadGuard<'_, BTreeMap<ApiVersion, VersionRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn records_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<ApiVersion, VersionRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn matrix(&self) -> RwLockReadGuard<'_, CompatibilityMatrix> {
        self.matrix.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Counter incremented by every mutation
    ///
    /// Results derived from the registry are stale once this changes.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Register a version with default metadata
    ///
    /// Re-registering resets the metadata to the defaults.
    pub fn register(&self, version: ApiVersion) {
        self.register_record(VersionRecord::new(version));
    }

    /// Register a version unless it is already known; returns whether it was added
    pub fn ensure_registered(&self, version: &ApiVersion) -> bool {
        let mut records = self.records_mut();
        if records.contains_key(version) {
            return false;
        }
        info!(version = %version, "Registered API version");
        records.insert(version.clone(), VersionRecord::new(version.clone()));
        self.bump();
        true
    }

    /// Register or replace a version together with its metadata
    pub fn register_record(&self, record: VersionRecord) {
        info!(
            version = %record.version,
            deprecated = record.deprecated,
            "Registered API version"
        );
        self.records_mut().insert(record.version.clone(), record);
        self.bump();
    }

    /// Modify the metadata of a registered version
    ///
    /// Lifecycle changes are not restricted; a sunset version may be made active again.
    pub fn update<F>(&self, version: &ApiVersion, f: F) -> Result<()>
    where
        F: FnOnce(&mut VersionRecord),
    {
        let mut records = self.records_mut();
        let record = records
            .get_mut(version)
            .ok_or_else(|| VersioningError::NotRegistered(version.clone()))?;

        f(record);
        // the key is authoritative
        record.version = version.clone();
        self.bump();
        info!(version = %version, "Updated API version metadata");
        Ok(())
    }

    /// Mark a registered version as deprecated
    pub fn deprecate(
        &self,
        version: &ApiVersion,
        info: DeprecationInfo,
        sunset_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.update(version, |record| {
            record.deprecated = true;
            record.deprecation = Some(info);
            record.sunset_at = sunset_at;
        })
    }

    /// Remove a version; returns the removed record
    pub fn remove(&self, version: &ApiVersion) -> Option<VersionRecord> {
        let removed = self.records_mut().remove(version);
        if removed.is_some() {
            self.bump();
            info!(version = %version, "Removed API version");
        }
        removed
    }

    /// Whether `version` is registered
    pub fn is_supported(&self, version: &ApiVersion) -> bool {
        self.records().contains_key(version)
    }

    /// Registered versions, ascending
    pub fn available_versions(&self) -> Vec<ApiVersion> {
        self.records().keys().cloned().collect()
    }

    /// Registered versions inside `range`, ascending
    pub fn versions_in(&self, range: &VersionRange) -> Vec<ApiVersion> {
        range.filter(self.records().keys())
    }

    /// Highest registered version
    pub fn latest_version(&self) -> Option<ApiVersion> {
        self.records().keys().next_back().cloned()
    }

    /// Number of registered versions
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Copy of the record for `version`
    pub fn record(&self, version: &ApiVersion) -> Option<VersionRecord> {
        self.records().get(version).cloned()
    }

    /// Pick a registered version for `requested`
    pub fn negotiate(&self, requested: &ApiVersion, policy: NegotiationPolicy) -> Option<ApiVersion> {
        let available = self.available_versions();
        let matrix = self.matrix();
        let chosen = Negotiator::new(&matrix).negotiate(requested, &available, policy);

        debug!(
            requested = %requested,
            policy = %policy,
            chosen = ?chosen.as_ref().map(ToString::to_string),
            "Negotiated version"
        );
        chosen
    }

    /// Lifecycle of `version` now; `None` if not registered
    pub fn lifecycle_of(&self, version: &ApiVersion) -> Option<Lifecycle> {
        self.lifecycle_at(version, Utc::now())
    }

    /// Lifecycle of `version` at `now`
    pub fn lifecycle_at(&self, version: &ApiVersion, now: DateTime<Utc>) -> Option<Lifecycle> {
        self.records().get(version).map(|r| r.lifecycle_at(now))
    }

    /// Whether `version` is past its sunset date
    pub fn is_sunset(&self, version: &ApiVersion) -> bool {
        self.is_sunset_at(version, Utc::now())
    }

    /// Whether `version` is past its sunset date at `now`
    pub fn is_sunset_at(&self, version: &ApiVersion, now: DateTime<Utc>) -> bool {
        self.lifecycle_at(version, now) == Some(Lifecycle::Sunset)
    }

    /// Deprecation details, if `version` is deprecated
    pub fn deprecation_info(&self, version: &ApiVersion) -> Option<DeprecationInfo> {
        self.records()
            .get(version)
            .filter(|r| r.deprecated)
            .map(|r| r.deprecation.clone().unwrap_or_default())
    }

    /// Summary of one version
    pub fn version_info(&self, version: &ApiVersion) -> Option<VersionInfo> {
        let now = Utc::now();
        self.records().get(version).map(|r| r.info_at(now))
    }

    /// Summaries of every version, ascending
    pub fn all_version_info(&self) -> Vec<VersionInfo> {
        let now = Utc::now();
        self.records().values().map(|r| r.info_at(now)).collect()
    }

    /// Counts by lifecycle and stability
    pub fn statistics(&self) -> RegistryStatistics {
        self.statistics_at(Utc::now())
    }

    /// Counts by lifecycle and stability at `now`
    pub fn statistics_at(&self, now: DateTime<Utc>) -> RegistryStatistics {
        let records = self.records();
        let mut stats = RegistryStatistics {
            total: records.len(),
            latest: records.keys().next_back().cloned(),
            ..RegistryStatistics::default()
        };

        for record in records.values() {
            match record.lifecycle_at(now) {
                Lifecycle::Active => {}
                Lifecycle::Deprecated => stats.deprecated += 1,
                Lifecycle::Sunset => {
                    stats.deprecated += 1;
                    stats.sunset += 1;
                }
            }
            match record.stability {
                Stability::Stable => stats.stable += 1,
                Stability::Beta => stats.beta += 1,
                Stability::Alpha => stats.alpha += 1,
            }
        }

        stats
    }

    /// Add a compatibility rule
    pub fn add_rule(&self, rule: CompatibilityRule) {
        debug!(from = %rule.from, to = %rule.to, compatible = rule.compatible, "Added compatibility rule");
        self.matrix
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_rule(rule);
        self.bump();
    }

    /// Replace the compatibility matrix
    pub fn set_matrix(&self, matrix: CompatibilityMatrix) {
        *self.matrix.write().unwrap_or_else(PoisonError::into_inner) = matrix;
        self.bump();
    }

    /// Copy of the compatibility matrix
    pub fn matrix_snapshot(&self) -> CompatibilityMatrix {
        self.matrix().clone()
    }

    /// Registered versions compatible with `version`, ascending
    pub fn compatible_versions(&self, version: &ApiVersion) -> Vec<ApiVersion> {
        let matrix = self.matrix();
        self.available_versions()
            .into_iter()
            .filter(|other| matrix.is_compatible(version, other))
            .collect()
    }

    /// Shortest chain of compatible hops between two versions
    pub fn find_upgrade_path(&self, from: &ApiVersion, to: &ApiVersion) -> Option<Vec<ApiVersion>> {
        self.matrix().find_upgrade_path(from, to)
    }
}

/// Snapshot counts of a registry
///
/// A sunset version counts as deprecated too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStatistics {
    pub total: usize,
    pub deprecated: usize,
    pub sunset: usize,
    pub stable: usize,
    pub beta: usize,
    pub alpha: usize,
    pub latest: Option<ApiVersion>,
}
