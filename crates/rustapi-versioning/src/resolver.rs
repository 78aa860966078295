//! Request -> version resolution
//!
//! [`VersionResolver::resolve`] runs extraction, parsing, the support check,
//! negotiation and caching in that order:
//!
//! 1. the configured strategies (as one [`CompositeStrategy`]) produce a token
//! 2. the token is parsed; malformed input fails with a format error
//! 3. a registered version is served as is
//! 4. otherwise `strict_matching` or a disabled `auto_fallback` rejects it,
//!    or the registry negotiates a substitute under the configured policy
//! 5. a failed negotiation serves `default_version` when `fallback_to_default`
//!    is on, and fails otherwise
//!
//! Requests without a token get `default_version`, or fail when none is set.
//! Only successful resolutions are cached, and only for the registry
//! generation they were computed against.

use crate::cache::{CachePool, CacheStats, CachedResolution, CleanupReport, ResolutionCache};
use crate::compat::{NegotiationReport, Negotiator};
use crate::config::VersioningConfig;
use crate::error::{Result, VersioningError};
use crate::record::{DeprecationInfo, Lifecycle, VersionInfo, VersionRecord};
use crate::registry::{RegistryStatistics, VersionRegistry};
use crate::request::VersionRequest;
use crate::routes::RouteCatalog;
use crate::strategy::{
    CompositeStrategy, ExtractedToken, ExtractionStrategy, StrategyDescription, VersionSource,
};
use crate::version::ApiVersion;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of resolving one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedVersion {
    /// Version to serve
    pub version: ApiVersion,
    /// Version the client asked for, if it asked
    pub requested: Option<ApiVersion>,
    /// Where the served version came from
    pub source: VersionSource,
    /// Strategy that produced the token
    pub strategy: Option<String>,
    /// Whether the served version differs from the requested one
    pub negotiated: bool,
    /// Lifecycle at resolution time; `None` if the version is not registered
    pub lifecycle: Option<Lifecycle>,
    /// Deprecation details of the served version
    pub deprecation: Option<DeprecationInfo>,
    /// Sunset date of the served version
    pub sunset_at: Option<DateTime<Utc>>,
    /// Notice for `X-Deprecation-Notice`
    pub deprecation_notice: Option<String>,
}

impl ResolvedVersion {
    /// Whether the served version is deprecated or sunset
    pub fn is_deprecated(&self) -> bool {
        matches!(
            self.lifecycle,
            Some(Lifecycle::Deprecated) | Some(Lifecycle::Sunset)
        )
    }

    /// Whether the served version is past its sunset date
    pub fn is_sunset(&self) -> bool {
        self.lifecycle == Some(Lifecycle::Sunset)
    }

    /// Get HTTP headers for this resolved version
    pub fn response_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("API-Version".to_string(), self.version.to_string());
        self.insert_deprecation_headers(&mut headers);
        headers
    }

    fn insert_deprecation_headers(&self, headers: &mut HashMap<String, String>) {
        if !self.is_deprecated() {
            return;
        }

        headers.insert("Deprecation".to_string(), "true".to_string());

        if let Some(sunset) = &self.sunset_at {
            headers.insert("Sunset".to_string(), sunset.to_rfc2822());
        }

        if let Some(info) = &self.deprecation {
            if let Some(replacement) = &info.replacement {
                headers.insert("X-API-Replacement".to_string(), replacement.clone());
            }
            if let Some(guide) = &info.migration_guide {
                headers.insert("X-API-Migration-Guide".to_string(), guide.clone());
            }
        }

        if let Some(notice) = &self.deprecation_notice {
            headers.insert("X-Deprecation-Notice".to_string(), notice.clone());
        }
    }
}

/// Resolves the API version of incoming requests
///
/// Construct once and share (it is `Send + Sync`); every call is synchronous
/// and holds locks only for the duration of a single map operation.
#[derive(Debug)]
pub struct VersionResolver {
    config: VersioningConfig,
    registry: Arc<VersionRegistry>,
    strategy: CompositeStrategy,
    cache: ResolutionCache,
}

impl VersionResolver {
    /// Create a resolver over `registry`
    ///
    /// Rules and versions from `config.compatibility_matrix` are merged into
    /// the registry's matrix, and the default version is registered if it is
    /// missing.
    pub fn new(config: VersioningConfig, registry: Arc<VersionRegistry>) -> Result<Self> {
        config.validate()?;

        let strategy = CompositeStrategy::new(config.strategies.iter().map(|s| s.build()).collect());

        let extra = &config.compatibility_matrix;
        if extra.rule_count() > 0 || !extra.all_versions().is_empty() {
            let mut matrix = registry.matrix_snapshot();
            for version in extra.all_versions() {
                matrix.add_version(version);
            }
            for rule in extra.rules() {
                matrix.add_rule(rule.clone());
            }
            registry.set_matrix(matrix);
        }

        if let Some(default) = &config.default_version {
            registry.ensure_registered(default);
        }

        info!(
            strategies = strategy.strategies().len(),
            policy = %config.negotiation_policy,
            default_version = ?config.default_version.as_ref().map(ToString::to_string),
            cache = config.cache.enabled,
            "Version resolver initialized"
        );

        Ok(Self {
            cache: ResolutionCache::new(config.cache.clone())
                .with_headers(strategy.header_names()),
            config,
            registry,
            strategy,
        })
    }

    /// Create a resolver with a fresh registry holding `versions`
    pub fn with_versions<I>(config: VersioningConfig, versions: I) -> Result<Self>
    where
        I: IntoIterator<Item = ApiVersion>,
    {
        let registry = VersionRegistry::new();
        for version in versions {
            registry.register(version);
        }
        Self::new(config, Arc::new(registry))
    }

    /// Resolve the version to serve for `request`
    pub fn resolve(&self, request: &VersionRequest) -> Result<ResolvedVersion> {
        let generation = self.registry.generation();
        let fingerprint = self
            .cache
            .is_enabled()
            .then(|| self.cache.fingerprint(request));

        if let Some(fp) = &fingerprint {
            if let Some(hit) = self.cache.get_resolution(fp) {
                if hit.generation == generation {
                    return Ok(self.describe(hit));
                }
                debug!(fingerprint = %fp, "Discarding cached resolution from older registry state");
            }
        }

        let resolution = self.resolve_uncached(request, generation)?;
        if let Some(fp) = fingerprint {
            self.cache.put_resolution(fp, resolution.clone());
        }
        Ok(self.describe(resolution))
    }

    /// Resolve an `http::Request`
    pub fn resolve_http<B>(&self, request: &http::Request<B>) -> Result<ResolvedVersion> {
        self.resolve(&VersionRequest::from_http(request))
    }

    fn resolve_uncached(&self, request: &VersionRequest, generation: u64) -> Result<CachedResolution> {
        let token = match self.strategy.extract_detailed(request)? {
            Some(token) => token,
            None => return self.resolve_default(request, generation),
        };

        let requested = ApiVersion::parse(&token.raw)
            .map_err(|e| VersioningError::format(token.raw.clone(), e.to_string()))?;

        debug!(
            requested = %requested,
            strategy = token.strategy.as_str(),
            source = %token.source,
            "Version extracted from request"
        );

        if self.registry.is_supported(&requested) {
            return Ok(resolution(requested.clone(), Some(requested), &token, false, generation));
        }

        if self.config.rejects_unsupported() {
            warn!(requested = %requested, "Unsupported API version requested");
            return Err(VersioningError::Unsupported {
                requested,
                available: self.registry.available_versions(),
            });
        }

        let policy = self.config.negotiation_policy;
        if let Some(version) = self.registry.negotiate(&requested, policy) {
            return Ok(resolution(version, Some(requested), &token, true, generation));
        }

        match (&self.config.default_version, self.config.fallback_to_default) {
            (Some(default), true) => {
                warn!(
                    requested = %requested,
                    policy = %policy,
                    fallback = %default,
                    "Negotiation failed, serving default version"
                );
                Ok(CachedResolution {
                    version: default.clone(),
                    requested: Some(requested),
                    source: VersionSource::Default,
                    strategy: Some(token.strategy),
                    negotiated: true,
                    generation,
                })
            }
            _ => {
                warn!(requested = %requested, policy = %policy, "Version negotiation failed");
                Err(VersioningError::Negotiation {
                    requested,
                    available: self.registry.available_versions(),
                    policy,
                })
            }
        }
    }

    fn resolve_default(&self, request: &VersionRequest, generation: u64) -> Result<CachedResolution> {
        match &self.config.default_version {
            Some(default) => {
                debug!(path = request.path(), version = %default, "No version in request, using default");
                Ok(CachedResolution {
                    version: default.clone(),
                    requested: None,
                    source: VersionSource::Default,
                    strategy: None,
                    negotiated: false,
                    generation,
                })
            }
            None => Err(VersioningError::NoVersion),
        }
    }

    fn describe(&self, resolution: CachedResolution) -> ResolvedVersion {
        let now = Utc::now();
        let record = self.registry.record(&resolution.version);

        let lifecycle = record.as_ref().map(|r| r.lifecycle_at(now));
        let deprecation = record
            .as_ref()
            .filter(|r| r.deprecated)
            .map(|r| r.deprecation.clone().unwrap_or_default());
        let sunset_at = record.as_ref().and_then(|r| r.sunset_at);
        let deprecation_notice = deprecation
            .as_ref()
            .map(|info| info.notice(sunset_at, now));

        ResolvedVersion {
            version: resolution.version,
            requested: resolution.requested,
            source: resolution.source,
            strategy: resolution.strategy,
            negotiated: resolution.negotiated,
            lifecycle,
            deprecation,
            sunset_at,
            deprecation_notice,
        }
    }

    /// Response headers for `resolved`, honoring the header settings
    pub fn response_headers(&self, resolved: &ResolvedVersion) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if self.config.include_version_headers {
            headers.insert("API-Version".to_string(), resolved.version.to_string());
        }
        if self.config.deprecation_warnings {
            resolved.insert_deprecation_headers(&mut headers);
        }
        headers
    }

    /// Registry version serving `method path` for a client asking for `requested`
    ///
    /// Exact catalog entries win; otherwise the catalog's versions for the
    /// endpoint are negotiated under the configured policy. Results are kept
    /// in the route pool, so invalidate it after changing `catalog`.
    pub fn route_version<H>(
        &self,
        catalog: &RouteCatalog<H>,
        method: &str,
        path: &str,
        requested: &ApiVersion,
    ) -> Option<ApiVersion> {
        let key = ResolutionCache::route_key(method, path, requested);
        if let Some(version) = self.cache.get_route(&key) {
            return Some(version);
        }

        let version = if catalog.get(method, path, requested).is_some() {
            Some(requested.clone())
        } else {
            let candidates = catalog.versions_for(method, path);
            let matrix = self.registry.matrix_snapshot();
            Negotiator::new(&matrix).negotiate(requested, &candidates, self.config.negotiation_policy)
        }?;

        self.cache.put_route(key, version.clone());
        Some(version)
    }

    /// Register a version with default metadata
    pub fn register(&self, version: ApiVersion) {
        self.registry.register(version);
        self.invalidate_derived();
    }

    /// Register or replace a version together with its metadata
    pub fn register_record(&self, record: VersionRecord) {
        self.registry.register_record(record);
        self.invalidate_derived();
    }

    fn invalidate_derived(&self) {
        self.cache.invalidate(CachePool::Version);
        self.cache.invalidate(CachePool::Route);
    }

    /// How `negotiated` relates to `requested` under the current rules
    pub fn negotiation_report(&self, requested: &ApiVersion, negotiated: &ApiVersion) -> NegotiationReport {
        let matrix = self.registry.matrix_snapshot();
        Negotiator::new(&matrix).report(requested, negotiated)
    }

    /// Route path for `version` as the highest-priority strategy renders it
    pub fn format_route_path(&self, path: &str, version: &ApiVersion) -> String {
        self.strategy.format_route_path(path, version)
    }

    /// Every route path `version` should be reachable under
    pub fn alternative_paths(&self, path: &str, version: &ApiVersion) -> Vec<String> {
        self.strategy.alternative_paths(path, version)
    }

    /// Token the strategies extract from `request`, without resolving it
    pub fn extract(&self, request: &VersionRequest) -> Result<Option<ExtractedToken>> {
        self.strategy.extract_detailed(request)
    }

    /// Registered versions, ascending
    pub fn available_versions(&self) -> Vec<ApiVersion> {
        self.registry.available_versions()
    }

    /// Summary of one version, or of every version when `version` is `None`
    pub fn version_info(&self, version: Option<&ApiVersion>) -> Vec<VersionInfo> {
        match version {
            Some(version) => self.registry.version_info(version).into_iter().collect(),
            None => self.registry.all_version_info(),
        }
    }

    /// Registry counts
    pub fn statistics(&self) -> RegistryStatistics {
        self.registry.statistics()
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop expired cache entries if the cleanup interval has passed
    pub fn cleanup_expired(&self) -> Option<CleanupReport> {
        self.cache.cleanup_expired()
    }

    /// Clear one cache pool
    pub fn invalidate(&self, pool: CachePool) -> usize {
        self.cache.invalidate(pool)
    }

    /// Configured strategies in the order they are tried
    pub fn strategies(&self) -> Vec<StrategyDescription> {
        self.strategy.describe_all()
    }

    /// Active configuration
    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    /// Shared registry
    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.registry
    }

    /// Resolution cache
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }
}

fn resolution(
    version: ApiVersion,
    requested: Option<ApiVersion>,
    token: &ExtractedToken,
    negotiated: bool,
    generation: u64,
) -> CachedResolution {
    let negotiated = negotiated && requested.as_ref() != Some(&version);
    CachedResolution {
        version,
        requested,
        source: token.source,
        strategy: Some(token.strategy.clone()),
        negotiated,
        generation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::{CompatibilityRule, NegotiationPolicy};
    use crate::record::WarningLevel;
    use crate::strategy::StrategySpec;
    use chrono::Duration;

    fn v(s: &str) -> ApiVersion {
        s.parse().unwrap()
    }

    fn header_config() -> VersioningConfig {
        VersioningConfig::builder()
            .strategy(StrategySpec::header())
            .build()
            .unwrap()
    }

    fn resolver(config: VersioningConfig) -> VersionResolver {
        VersionResolver::with_versions(config, [v("1.0"), v("1.1"), v("2.0")]).unwrap()
    }

    fn request(version: &str) -> VersionRequest {
        VersionRequest::get("/users").header("X-API-Version", version)
    }

    #[test]
    fn test_exact_match() {
        let resolver = resolver(header_config());
        let resolved = resolver.resolve(&request("1.1")).unwrap();

        assert_eq!(resolved.version, v("1.1"));
        assert_eq!(resolved.requested, Some(v("1.1")));
        assert_eq!(resolved.source, VersionSource::Header);
        assert_eq!(resolved.strategy.as_deref(), Some("header"));
        assert!(!resolved.negotiated);
        assert_eq!(resolved.lifecycle, Some(Lifecycle::Active));
    }

    #[test]
    fn test_default_when_absent() {
        let resolver = resolver(header_config());
        let resolved = resolver.resolve(&VersionRequest::get("/users")).unwrap();

        assert_eq!(resolved.version, v("1.0"));
        assert_eq!(resolved.requested, None);
        assert_eq!(resolved.source, VersionSource::Default);
    }

    #[test]
    fn test_no_version_without_default() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::header())
            .no_default_version()
            .build()
            .unwrap();
        let err = resolver(config)
            .resolve(&VersionRequest::get("/users"))
            .unwrap_err();
        assert_eq!(err, VersioningError::NoVersion);
    }

    #[test]
    fn test_malformed_token_is_not_defaulted() {
        let resolver = resolver(header_config());
        let err = resolver.resolve(&request("one.two")).unwrap_err();
        assert!(err.is_format());
        assert!(matches!(err, VersioningError::Format { input, .. } if input == "one.two"));
    }

    #[test]
    fn test_negotiates_unsupported_version() {
        let resolver = resolver(header_config());
        let resolved = resolver.resolve(&request("1.5")).unwrap();

        // default heuristic: same major, not older than the request
        assert_eq!(resolved.version, v("1.1"));
        assert_eq!(resolved.requested, Some(v("1.5")));
        assert!(resolved.negotiated);
        assert_eq!(resolved.source, VersionSource::Header);
    }

    #[test]
    fn test_rejects_unsupported_when_fallback_disabled() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::header())
            .auto_fallback(false)
            .build()
            .unwrap();
        let err = resolver(config).resolve(&request("1.5")).unwrap_err();

        assert_eq!(
            err,
            VersioningError::Unsupported {
                requested: v("1.5"),
                available: vec![v("1.0"), v("1.1"), v("2.0")],
            }
        );
    }

    #[test]
    fn test_negotiation_failure_falls_back_to_default() {
        let resolver = resolver(header_config());
        let resolved = resolver.resolve(&request("7.0")).unwrap();

        assert_eq!(resolved.version, v("1.0"));
        assert_eq!(resolved.requested, Some(v("7.0")));
        assert_eq!(resolved.source, VersionSource::Default);
        assert!(resolved.negotiated);
    }

    #[test]
    fn test_negotiation_failure_without_default() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::header())
            .fallback_to_default(false)
            .negotiation_policy(NegotiationPolicy::ClosestHigher)
            .build()
            .unwrap();
        let err = resolver(config).resolve(&request("7.0")).unwrap_err();

        assert!(matches!(
            err,
            VersioningError::Negotiation {
                policy: NegotiationPolicy::ClosestHigher,
                ..
            }
        ));
        assert_eq!(err.available_versions().len(), 3);
    }

    #[test]
    fn test_same_config_same_outcome() {
        let resolver = resolver(header_config());
        for _ in 0..3 {
            assert_eq!(resolver.resolve(&request("1.5")).unwrap().version, v("1.1"));
            assert_eq!(resolver.resolve(&request("7.0")).unwrap().version, v("1.0"));
        }
    }

    #[test]
    fn test_cache_hit_on_repeat() {
        let resolver = resolver(header_config());
        let first = resolver.resolve(&request("2.0")).unwrap();
        let second = resolver.resolve(&request("2.0")).unwrap();

        assert_eq!(first, second);
        let stats = resolver.cache_stats();
        assert_eq!(stats.version.hits, 1);
        assert_eq!(stats.version.misses, 1);
        assert_eq!(stats.version.size, 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::header())
            .strict_matching(true)
            .build()
            .unwrap();
        let resolver = resolver(config);

        assert!(resolver.resolve(&request("3.0")).is_err());
        assert_eq!(resolver.cache_stats().version.size, 0);

        resolver.register(v("3.0"));
        assert_eq!(resolver.resolve(&request("3.0")).unwrap().version, v("3.0"));
    }

    #[test]
    fn test_registry_change_outside_resolver_is_seen() {
        let registry = Arc::new(VersionRegistry::new());
        registry.register(v("1.0"));
        registry.register(v("1.1"));
        let resolver = VersionResolver::new(header_config(), Arc::clone(&registry)).unwrap();

        assert_eq!(resolver.resolve(&request("1.2")).unwrap().version, v("1.1"));

        registry.register(v("1.2"));
        let resolved = resolver.resolve(&request("1.2")).unwrap();
        assert_eq!(resolved.version, v("1.2"));
        assert!(!resolved.negotiated);
    }

    #[test]
    fn test_disabled_cache_gives_same_results() {
        let cached = resolver(header_config());
        let uncached = resolver(
            VersioningConfig::builder()
                .strategy(StrategySpec::header())
                .without_cache()
                .build()
                .unwrap(),
        );

        for raw in ["1.0", "1.5", "2", "9.9"] {
            assert_eq!(
                cached.resolve(&request(raw)).unwrap(),
                uncached.resolve(&request(raw)).unwrap()
            );
        }
        assert_eq!(uncached.cache_stats().version.misses, 0);
    }

    #[test]
    fn test_config_matrix_is_merged() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::header())
            .fallback_to_default(false)
            .compatibility_matrix(
                crate::compat::CompatibilityMatrix::new().with_rule(
                    CompatibilityRule::new(v("3.0"), v("2.0")).unwrap(),
                ),
            )
            .build()
            .unwrap();
        let resolver = resolver(config);

        let resolved = resolver.resolve(&request("3.0")).unwrap();
        assert_eq!(resolved.version, v("2.0"));
        assert!(resolver
            .registry()
            .matrix_snapshot()
            .rule(&v("3.0"), &v("2.0"))
            .is_some());
    }

    #[test]
    fn test_deprecation_headers() {
        let resolver = resolver(header_config());
        let sunset = Utc::now() + Duration::days(30);
        resolver
            .registry()
            .deprecate(
                &v("1.0"),
                DeprecationInfo::new()
                    .with_warning_level(WarningLevel::Critical)
                    .with_replacement("2.0.0")
                    .with_migration_guide("https://example.com/migrate"),
                Some(sunset),
            )
            .unwrap();

        let resolved = resolver.resolve(&request("1.0")).unwrap();
        assert!(resolved.is_deprecated());
        assert!(!resolved.is_sunset());

        let headers = resolved.response_headers();
        assert_eq!(headers.get("API-Version").unwrap(), "1.0.0");
        assert_eq!(headers.get("Deprecation").unwrap(), "true");
        assert_eq!(headers.get("Sunset").unwrap(), &sunset.to_rfc2822());
        assert_eq!(headers.get("X-API-Replacement").unwrap(), "2.0.0");
        assert_eq!(
            headers.get("X-API-Migration-Guide").unwrap(),
            "https://example.com/migrate"
        );
        assert!(headers
            .get("X-Deprecation-Notice")
            .unwrap()
            .contains("Please use 2.0.0 instead"));

        let active = resolver.resolve(&request("2.0")).unwrap();
        assert_eq!(active.response_headers().len(), 1);
    }

    #[test]
    fn test_sunset_lifecycle() {
        let resolver = resolver(header_config());
        resolver
            .registry()
            .deprecate(&v("1.1"), DeprecationInfo::new(), Some(Utc::now() - Duration::days(1)))
            .unwrap();

        let resolved = resolver.resolve(&request("1.1")).unwrap();
        assert!(resolved.is_sunset());
        assert!(resolved
            .deprecation_notice
            .as_deref()
            .unwrap()
            .contains("has reached its sunset date"));
    }

    #[test]
    fn test_header_settings() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::header())
            .include_version_headers(false)
            .deprecation_warnings(false)
            .build()
            .unwrap();
        let resolver = resolver(config);
        resolver
            .registry()
            .deprecate(&v("1.0"), DeprecationInfo::new(), None)
            .unwrap();

        let resolved = resolver.resolve(&request("1.0")).unwrap();
        assert!(resolver.response_headers(&resolved).is_empty());
        assert_eq!(resolved.response_headers().len(), 3);
    }

    #[test]
    fn test_route_version() {
        let resolver = resolver(header_config());
        let catalog = RouteCatalog::new()
            .route("GET", "/users", v("1.0"), ())
            .unwrap()
            .route("GET", "/users", v("2.0"), ())
            .unwrap();

        assert_eq!(resolver.route_version(&catalog, "GET", "/users", &v("2.0")), Some(v("2.0")));
        assert_eq!(resolver.route_version(&catalog, "GET", "/users", &v("1.1")), Some(v("1.0")));
        assert_eq!(resolver.route_version(&catalog, "GET", "/items", &v("1.0")), None);

        assert_eq!(resolver.route_version(&catalog, "get", "/users", &v("2.0")), Some(v("2.0")));
        assert_eq!(resolver.cache_stats().route.hits, 1);
    }

    #[test]
    fn test_path_strategy_routes() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::path())
            .build()
            .unwrap();
        let resolver = resolver(config);

        assert_eq!(resolver.format_route_path("/users", &v("2.0")), "/v2.0/users");
        assert_eq!(
            resolver.alternative_paths("/users", &v("2.0")),
            vec!["/v2/users", "/v2.0/users", "/v2.0.0/users"]
        );

        let resolved = resolver.resolve(&VersionRequest::get("/v2/users")).unwrap();
        assert_eq!(resolved.version, v("2.0"));
        assert_eq!(resolved.source, VersionSource::Path);
    }

    #[test]
    fn test_introspection() {
        let resolver = resolver(header_config());

        assert_eq!(resolver.available_versions(), vec![v("1.0"), v("1.1"), v("2.0")]);
        assert_eq!(resolver.version_info(None).len(), 3);
        assert_eq!(resolver.version_info(Some(&v("2.0")))[0].version, v("2.0"));
        assert!(resolver.version_info(Some(&v("9.0"))).is_empty());
        assert_eq!(resolver.statistics().latest, Some(v("2.0")));
        assert_eq!(resolver.strategies()[0].name, "header");

        let report = resolver.negotiation_report(&v("1.5"), &v("1.1"));
        assert!(!report.exact_match);
    }

    #[test]
    fn test_resolve_http_request() {
        let resolver = resolver(header_config());
        let request = http::Request::builder()
            .method("POST")
            .uri("/users?page=2")
            .header("x-api-version", "2")
            .body(())
            .unwrap();

        assert_eq!(resolver.resolve_http(&request).unwrap().version, v("2.0"));
    }

    #[test]
    fn test_custom_header_names_are_fingerprinted() {
        let spec = StrategySpec::header_with_name("Api-Version").with_fallback("X-Version");
        let cached = resolver(VersioningConfig::builder().strategy(spec.clone()).build().unwrap());
        let uncached = resolver(
            VersioningConfig::builder()
                .strategy(spec)
                .without_cache()
                .build()
                .unwrap(),
        );
        assert!(cached
            .cache()
            .fingerprint_headers()
            .contains(&"x-version".to_string()));

        let requests = [
            (VersionRequest::get("/users").header("Api-Version", "2.0"), v("2.0")),
            (VersionRequest::get("/users").header("Api-Version", "1.1"), v("1.1")),
            (VersionRequest::get("/users").header("X-Version", "2.0"), v("2.0")),
            (VersionRequest::get("/users").header("X-Version", "1.1"), v("1.1")),
            (VersionRequest::get("/users"), v("1.0")),
        ];
        for (req, expected) in &requests {
            let hit = cached.resolve(req).unwrap();
            assert_eq!(&hit.version, expected);
            assert_eq!(hit, uncached.resolve(req).unwrap());
        }
        assert_eq!(cached.cache_stats().version.hits, 0);
    }

    #[test]
    fn test_default_version_is_registered() {
        let registry = Arc::new(VersionRegistry::new());
        registry.register(v("2.0"));
        let resolver = VersionResolver::new(header_config(), Arc::clone(&registry)).unwrap();

        let resolved = resolver.resolve(&VersionRequest::get("/users")).unwrap();
        assert_eq!(resolved.version, v("1.0"));
        assert_eq!(resolved.lifecycle, Some(Lifecycle::Active));
        assert_eq!(resolver.available_versions(), vec![v("1.0"), v("2.0")]);
        assert!(registry.is_supported(&v("1.0")));
    }

    #[test]
    fn test_default_registration_keeps_metadata() {
        let registry = Arc::new(VersionRegistry::new());
        registry.register_record(VersionRecord::new(v("1.0")).deprecated());
        let resolver = VersionResolver::new(header_config(), registry).unwrap();

        let resolved = resolver.resolve(&VersionRequest::get("/users")).unwrap();
        assert_eq!(resolved.lifecycle, Some(Lifecycle::Deprecated));
    }

    #[test]
    fn test_mixed_strategies_route_paths() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::header().with_priority(10))
            .strategy(StrategySpec::path().with_priority(20))
            .build()
            .unwrap();
        let mixed = resolver(config);

        assert_eq!(mixed.format_route_path("/users", &v("2.0")), "/v2.0/users");
        assert_eq!(
            mixed.alternative_paths("/users", &v("2.0")),
            vec!["/v2/users", "/v2.0/users", "/v2.0.0/users"]
        );

        let header_only = resolver(header_config());
        assert_eq!(header_only.format_route_path("/users", &v("2.0")), "/users");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = VersioningConfig {
            strategies: Vec::new(),
            ..VersioningConfig::default()
        };
        assert!(matches!(
            VersionResolver::with_versions(config, [v("1.0")]),
            Err(VersioningError::Config(_))
        ));
    }
}
