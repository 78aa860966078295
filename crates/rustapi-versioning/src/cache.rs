//! Resolution caching
//!
//! [`LruCache`] is a thread-safe LRU map with an optional TTL.
//! [`ResolutionCache`] combines three of them:
//! - version pool: request fingerprint -> resolution result
//! - route pool: `METHOD:path:version` -> version serving the route
//! - fingerprint pool: raw request key -> fingerprint digest
//!
//! The cache is a derived view. Dropping it changes performance, never results.

use crate::request::VersionRequest;
use crate::strategy::VersionSource;
use crate::version::ApiVersion;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Headers that always take part in the request fingerprint
///
/// [`ResolutionCache::with_headers`] extends this set with the headers the
/// configured strategies read.
pub const FINGERPRINT_HEADERS: [&str; 3] = ["x-api-version", "accept", "content-type"];

/// Hex characters kept from the SHA-256 digest
const FINGERPRINT_LEN: usize = 16;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    inserted_at: Instant,
}

#[derive(Debug)]
struct LruState<T> {
    entries: IndexMap<String, CacheEntry<T>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Thread-safe LRU cache with optional TTL
///
/// Entries are ordered from least to most recently used. An entry is expired
/// once its age reaches the TTL and is never returned after that.
#[derive(Debug)]
pub struct LruCache<T> {
    state: Mutex<LruState<T>>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl<T: Clone> LruCache<T> {
    /// Create a cache; a capacity of 0 disables it
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(LruState {
                entries: IndexMap::with_capacity(capacity.min(1024)),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
            capacity,
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LruState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &CacheEntry<T>, now: Instant) -> bool {
        self.ttl
            .map(|ttl| now.duration_since(entry.inserted_at) >= ttl)
            .unwrap_or(false)
    }

    /// Look up `key`, marking it most recently used
    pub fn get(&self, key: &str) -> Option<T> {
        if self.capacity == 0 {
            return None;
        }

        let now = Instant::now();
        let mut state = self.state();

        let expired = match state.entries.get(key).map(|entry| self.is_expired(entry, now)) {
            Some(expired) => expired,
            None => {
                state.misses += 1;
                return None;
            }
        };

        let entry = state.entries.shift_remove(key)?;
        if expired {
            state.expirations += 1;
            state.misses += 1;
            return None;
        }

        let value = entry.value.clone();
        state.entries.insert(key.to_string(), entry);
        state.hits += 1;
        Some(value)
    }

    /// Insert or refresh `key`, evicting the least recently used entry when full
    pub fn put(&self, key: impl Into<String>, value: T) {
        if self.capacity == 0 {
            return;
        }

        let key = key.into();
        let mut state = self.state();

        state.entries.shift_remove(&key);
        while state.entries.len() >= self.capacity {
            if state.entries.shift_remove_index(0).is_none() {
                break;
            }
            state.evictions += 1;
        }

        state.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove `key`
    pub fn remove(&self, key: &str) -> Option<T> {
        self.state().entries.shift_remove(key).map(|e| e.value)
    }

    /// Remove every entry; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut state = self.state();
        let removed = state.entries.len();
        state.entries.clear();
        removed
    }

    /// Drop expired entries; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let now = Instant::now();
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - state.entries.len();
        state.expirations += removed as u64;
        removed
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<String> {
        self.state().entries.keys().cloned().collect()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counters and occupancy
    pub fn stats(&self) -> PoolStats {
        let state = self.state();
        let lookups = state.hits + state.misses;
        PoolStats {
            size: state.entries.len(),
            capacity: self.capacity,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expirations: state.expirations,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
        }
    }
}

/// Counters of one pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// `hits / (hits + misses)`, 0 before the first lookup
    pub hit_rate: f64,
}

/// Settings of one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub enabled: bool,
    pub capacity: usize,
    /// Time to live in milliseconds; 0 keeps entries until evicted
    pub ttl_ms: u64,
}

impl PoolConfig {
    /// Enabled pool
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            enabled: true,
            capacity,
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    /// Disabled pool
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            capacity: 0,
            ttl_ms: 0,
        }
    }

    /// TTL, if any
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_ms > 0).then(|| Duration::from_millis(self.ttl_ms))
    }

    fn build<T: Clone>(&self, cache_enabled: bool) -> LruCache<T> {
        let capacity = if cache_enabled && self.enabled {
            self.capacity
        } else {
            0
        };
        LruCache::new(capacity, self.ttl())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }
}

/// Settings of the three resolution pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch
    pub enabled: bool,
    /// Resolution results
    pub version: PoolConfig,
    /// Route lookups
    pub route: PoolConfig,
    /// Request fingerprints
    pub fingerprint: PoolConfig,
    /// Minimum time between two expiry sweeps, in milliseconds
    pub cleanup_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            version: PoolConfig::new(1000, Duration::from_secs(3600)),
            route: PoolConfig::new(5000, Duration::from_secs(1800)),
            fingerprint: PoolConfig::new(2000, Duration::from_secs(300)),
            cleanup_interval_ms: 300_000,
        }
    }
}

impl CacheConfig {
    /// Every pool disabled
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Minimum time between two expiry sweeps
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

/// Pool selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePool {
    Version,
    Route,
    Fingerprint,
}

impl fmt::Display for CachePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => f.write_str("version"),
            Self::Route => f.write_str("route"),
            Self::Fingerprint => f.write_str("fingerprint"),
        }
    }
}

/// Stored outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResolution {
    /// Version to serve
    pub version: ApiVersion,
    /// Version parsed from the request, if any
    pub requested: Option<ApiVersion>,
    /// Where the version came from
    pub source: VersionSource,
    /// Strategy that produced the token
    pub strategy: Option<String>,
    /// Whether negotiation substituted the version
    pub negotiated: bool,
    /// Registry generation the result was computed against
    pub generation: u64,
}

/// Entries removed by one expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub versions: usize,
    pub routes: usize,
    pub fingerprints: usize,
}

impl CleanupReport {
    /// Sum over all pools
    pub fn total(&self) -> usize {
        self.versions + self.routes + self.fingerprints
    }
}

/// Statistics of every pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub version: PoolStats,
    pub route: PoolStats,
    pub fingerprint: PoolStats,
}

/// Memoization of the resolution pipeline
#[derive(Debug)]
pub struct ResolutionCache {
    config: CacheConfig,
    versions: LruCache<CachedResolution>,
    routes: LruCache<ApiVersion>,
    fingerprints: LruCache<String>,
    headers: Vec<String>,
    last_cleanup: Mutex<Instant>,
}

impl ResolutionCache {
    /// Build the pools described by `config`
    pub fn new(config: CacheConfig) -> Self {
        Self {
            versions: config.version.build(config.enabled),
            routes: config.route.build(config.enabled),
            fingerprints: config.fingerprint.build(config.enabled),
            headers: FINGERPRINT_HEADERS.iter().map(|h| h.to_string()).collect(),
            last_cleanup: Mutex::new(Instant::now()),
            config,
        }
    }

    /// Add headers to the fingerprint; names are lowercased and deduplicated
    pub fn with_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().to_ascii_lowercase();
            if !name.is_empty() && !self.headers.contains(&name) {
                self.headers.push(name);
            }
        }
        self
    }

    /// Header names hashed into each fingerprint
    pub fn fingerprint_headers(&self) -> &[String] {
        &self.headers
    }

    /// Whether caching is switched on
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Pool settings
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Deterministic digest of the version-relevant parts of a request
    ///
    /// Covers method, path, query string and every header in
    /// [`ResolutionCache::fingerprint_headers`]. The digest is memoized in the
    /// fingerprint pool.
    pub fn fingerprint(&self, request: &VersionRequest) -> String {
        let material = self.fingerprint_material(request);
        if let Some(digest) = self.fingerprints.get(&material) {
            return digest;
        }

        let digest = digest_hex(&material);
        self.fingerprints.put(material, digest.clone());
        digest
    }

    /// Cached resolution for a fingerprint
    pub fn get_resolution(&self, fingerprint: &str) -> Option<CachedResolution> {
        let hit = self.versions.get(fingerprint);
        trace!(fingerprint, hit = hit.is_some(), "Version cache lookup");
        hit
    }

    /// Store a resolution
    pub fn put_resolution(&self, fingerprint: impl Into<String>, resolution: CachedResolution) {
        self.versions.put(fingerprint, resolution);
    }

    /// Cached route lookup
    pub fn get_route(&self, key: &str) -> Option<ApiVersion> {
        let hit = self.routes.get(key);
        trace!(key, hit = hit.is_some(), "Route cache lookup");
        hit
    }

    /// Store a route lookup
    pub fn put_route(&self, key: impl Into<String>, version: ApiVersion) {
        self.routes.put(key, version);
    }

    /// Key used by the route pool
    pub fn route_key(method: &str, path: &str, version: &ApiVersion) -> String {
        format!("{}:{}:{}", method.to_ascii_uppercase(), path, version)
    }

    /// Preload resolutions; returns how many were stored
    pub fn warm<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, CachedResolution)>,
    {
        if !self.config.enabled || !self.config.version.enabled {
            return 0;
        }

        let mut count = 0;
        for (fingerprint, resolution) in entries {
            self.versions.put(fingerprint, resolution);
            count += 1;
        }
        debug!(count, "Warmed version cache");
        count
    }

    /// Clear one pool; returns how many entries were removed
    pub fn invalidate(&self, pool: CachePool) -> usize {
        let removed = match pool {
            CachePool::Version => self.versions.clear(),
            CachePool::Route => self.routes.clear(),
            CachePool::Fingerprint => self.fingerprints.clear(),
        };
        info!(pool = %pool, removed, "Invalidated cache pool");
        removed
    }

    /// Clear every pool; returns how many entries were removed
    pub fn invalidate_all(&self) -> usize {
        [CachePool::Version, CachePool::Route, CachePool::Fingerprint]
            .into_iter()
            .map(|pool| self.invalidate(pool))
            .sum()
    }

    /// Drop expired entries, at most once per cleanup interval
    ///
    /// Returns `None` when the previous sweep is too recent.
    pub fn cleanup_expired(&self) -> Option<CleanupReport> {
        {
            let mut last = self
                .last_cleanup
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.elapsed() < self.config.cleanup_interval() {
                return None;
            }
            *last = Instant::now();
        }
        Some(self.force_cleanup())
    }

    /// Drop expired entries now, ignoring the interval
    pub fn force_cleanup(&self) -> CleanupReport {
        let report = CleanupReport {
            versions: self.versions.cleanup_expired(),
            routes: self.routes.cleanup_expired(),
            fingerprints: self.fingerprints.cleanup_expired(),
        };
        if report.total() > 0 {
            debug!(
                versions = report.versions,
                routes = report.routes,
                fingerprints = report.fingerprints,
                "Removed expired cache entries"
            );
        }
        report
    }

    /// Statistics of every pool
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.config.enabled,
            version: self.versions.stats(),
            route: self.routes.stats(),
            fingerprint: self.fingerprints.stats(),
        }
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ResolutionCache {
    // Every variable part is length-prefixed so no value can imitate a separator.
    fn fingerprint_material(&self, request: &VersionRequest) -> String {
        let query = request.query_string();
        let mut material = String::new();
        for part in [request.method().as_str(), request.path(), query.as_str()] {
            material.push_str(&format!("{}:{}|", part.len(), part));
        }
        for name in &self.headers {
            match request.header_str(name) {
                Some(value) => material.push_str(&format!("{}={}:{};", name, value.len(), value)),
                None => material.push_str(&format!("{}=-;", name)),
            }
        }
        material
    }
}

fn digest_hex(material: &str) -> String {
    let digest = Sha256::digest(material.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}
